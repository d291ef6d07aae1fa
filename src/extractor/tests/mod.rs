use std::fs;
use url::Url;

use crate::entities::Channel;
use crate::extractor::{extract, extract_page};
use crate::fetcher::PageResponse;

const BOOKS_URL: &str = "https://www.books.com.tw/web/sys_saletopb/books/07";
const ESLITE_URL: &str = "https://www.eslite.com/best-sellers/humanities";

fn fixture(name: &str) -> String {
    fs::read_to_string(format!("src/extractor/tests/fixtures/{name}"))
        .expect("Failed to read test fixture")
}

fn url(s: &str) -> Url {
    Url::parse(s).unwrap()
}

#[test]
fn test_books_com_tw_ranks_skip_untitled_entries() {
    let items = extract(Channel::BooksComTw, &fixture("books_com_tw.html"), &url(BOOKS_URL), 20);

    // 12 entries, one is an ad slot without a link
    assert_eq!(items.len(), 11);
    let ranks: Vec<u32> = items.iter().map(|i| i.rank).collect();
    assert_eq!(ranks, (1..=11).collect::<Vec<_>>());

    assert_eq!(items[0].title, "設計的法則");
    assert_eq!(items[1].title, "日常的設計");
    // the ad slot is skipped, so the fourth entry takes rank 3
    assert_eq!(items[2].title, "版面設計的原理");
    assert_eq!(items[2].rank, 3);
}

#[test]
fn test_books_com_tw_title_attribute_and_links() {
    let items = extract(Channel::BooksComTw, &fixture("books_com_tw.html"), &url(BOOKS_URL), 20);

    // image-only link carries its title in the attribute
    assert_eq!(items[3].title, "色彩的履歷書");
    assert_eq!(
        items[3].url.as_deref(),
        Some("https://www.books.com.tw/products/0010000005")
    );
    assert!(items.iter().all(|i| i.isbn.is_none()));
}

#[test]
fn test_books_com_tw_author_fallbacks() {
    let items = extract(Channel::BooksComTw, &fixture("books_com_tw.html"), &url(BOOKS_URL), 20);

    assert_eq!(items[0].author.as_deref(), Some("作者：阿部雅世"));
    // p > a[rel='goAuthor']
    assert_eq!(items[5].title, "觀看之道");
    assert_eq!(items[5].author.as_deref(), Some("約翰．伯格"));
    // span.author
    assert_eq!(items[7].title, "包浩斯");
    assert_eq!(items[7].author.as_deref(), Some("法蘭克．惠特佛"));
    // no author markup at all
    assert_eq!(items[9].title, "平面設計史");
    assert_eq!(items[9].author, None);
}

#[test]
fn test_max_rank_caps_output() {
    let items = extract(Channel::BooksComTw, &fixture("books_com_tw.html"), &url(BOOKS_URL), 5);

    assert_eq!(items.len(), 5);
    assert_eq!(items.last().unwrap().rank, 5);
}

#[test]
fn test_eslite_prefers_selector_meeting_threshold() {
    let items = extract(Channel::Eslite, &fixture("eslite.html"), &url(ESLITE_URL), 20);

    // the three sidebar cards match first but fall short of the threshold
    assert_eq!(items.len(), 12);
    assert!(items.iter().all(|i| !i.title.starts_with("編輯推薦")));
    assert_eq!(items[0].title, "被討厭的勇氣 （新版）");
    assert_eq!(items[0].author.as_deref(), Some("岸見一郎"));
    assert_eq!(
        items[0].url.as_deref(),
        Some("https://www.eslite.com/product/1001")
    );
    assert_eq!(items[6].author, None);
}

#[test]
fn test_short_list_falls_back_to_first_matching_selector() {
    let html = r#"<html><body>
        <div class="product-item"><a href="/product/1">One</a></div>
        <div class="product-item"><a href="/product/2">Two</a></div>
        <li class="ProductCard"><a href="/product/3">Elsewhere</a></li>
    </body></html>"#;

    let items = extract(Channel::Eslite, html, &url(ESLITE_URL), 20);

    let titles: Vec<&str> = items.iter().map(|i| i.title.as_str()).collect();
    assert_eq!(titles, vec!["One", "Two"]);
}

#[test]
fn test_duplicate_titles_are_kept() {
    let html = r#"<ul id="itemlist">
        <li><a href="/a">Same</a></li>
        <li><a href="/b">Same</a></li>
    </ul>"#;

    let items = extract(Channel::BooksComTw, html, &url(BOOKS_URL), 20);

    assert_eq!(items.len(), 2);
    assert_eq!((items[0].rank, items[1].rank), (1, 2));
    assert_eq!(items[0].title, items[1].title);
}

#[test]
fn test_empty_and_malformed_documents_yield_nothing() {
    for html in [
        "",
        "not html at all",
        "<html><head><title>Broken</title><body><p>Unclosed<div>",
        "<ul id=\"itemlist\"><li></li><li><a>   </a></li></ul>",
    ] {
        for channel in Channel::ALL {
            assert!(extract(channel, html, &url(BOOKS_URL), 20).is_empty(), "{html:?}");
        }
    }
}

#[test]
fn test_extract_page_resolves_against_final_url() {
    let html = r#"<ul id="itemlist"><li><a href="products/42">Moved</a></li></ul>"#;
    let page = PageResponse::from_html(url("https://www.books.com.tw/new/path/"), html);

    let items = extract_page(Channel::BooksComTw, &page, 20);

    assert_eq!(
        items[0].url.as_deref(),
        Some("https://www.books.com.tw/new/path/products/42")
    );
}

#[cfg(feature = "fuzz")]
mod fuzz {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn test_extract_never_panics(html in ".*", max_rank in 0u32..50) {
            for channel in Channel::ALL {
                let items = extract(channel, &html, &url(BOOKS_URL), max_rank);
                prop_assert!(items.len() <= max_rank as usize);
            }
        }

        #[test]
        fn test_ranks_are_dense_from_one(
            titles in proptest::collection::vec("[a-zA-Z ]{0,12}", 0..30),
        ) {
            let body: String = titles
                .iter()
                .map(|t| format!("<li><a href=\"/p\">{t}</a></li>"))
                .collect();
            let html = format!("<ul id=\"itemlist\">{body}</ul>");
            let expected = titles.iter().filter(|t| !t.trim().is_empty()).count().min(20);

            let items = extract(Channel::BooksComTw, &html, &url(BOOKS_URL), 20);

            prop_assert_eq!(items.len(), expected);
            for (idx, item) in items.iter().enumerate() {
                prop_assert_eq!(item.rank as usize, idx + 1);
            }
        }
    }
}
