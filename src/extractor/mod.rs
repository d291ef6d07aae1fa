pub mod channel;

#[cfg(test)]
mod tests;

pub use channel::{ChannelLayout, layout};

use scraper::{ElementRef, Html, Selector};
use tracing::debug;
use url::Url;

use crate::entities::{Channel, RawItem};
use crate::fetcher::PageResponse;

/// A container selector is adopted once it matches at least this many entries.
pub const MIN_CONTAINER_MATCHES: usize = 10;

/// Extract the ranked entries of a fetched page, resolving links against the
/// final (post-redirect) URL.
pub fn extract_page(channel: Channel, page: &PageResponse, max_rank: u32) -> Vec<RawItem> {
    extract(channel, &page.body_utf8, &page.url_final, max_rank)
}

/// Turn a listing page into ranked entries, in document order.
///
/// Entries without a usable title are skipped and do not consume a rank.
/// Never fails: markup that matches nothing yields an empty list.
pub fn extract(channel: Channel, html: &str, base_url: &Url, max_rank: u32) -> Vec<RawItem> {
    let layout = layout(channel);
    let document = Html::parse_document(html);

    let Some(entries) = select_entries(&document, layout.containers) else {
        debug!(%channel, "no container selector matched");
        return Vec::new();
    };

    let links = compile(layout.links);
    let authors = compile(layout.authors);
    let max_rank = max_rank as usize;

    let mut items = Vec::new();
    for entry in entries {
        if items.len() >= max_rank {
            break;
        }

        let link = links.iter().find_map(|sel| entry.select(sel).next());
        let Some(title) = link.and_then(|a| link_title(a, layout.title_separator)) else {
            continue;
        };
        let url = link
            .and_then(|a| a.value().attr("href"))
            .and_then(|href| base_url.join(href.trim()).ok())
            .map(String::from);
        let author = authors
            .iter()
            .filter_map(|sel| entry.select(sel).next())
            .map(|node| element_text(node, " "))
            .find(|text| !text.is_empty());

        items.push(RawItem {
            rank: items.len() as u32 + 1,
            title,
            author,
            isbn: None,
            url,
        });
    }

    items
}

/// First container selector reaching the threshold wins. If none does, the
/// highest-priority selector that matched anything is used so short lists
/// still come through.
fn select_entries<'a>(document: &'a Html, containers: &[&str]) -> Option<Vec<ElementRef<'a>>> {
    let mut fallback: Option<Vec<ElementRef<'a>>> = None;

    for selector in compile(containers) {
        let matches: Vec<_> = document.select(&selector).collect();
        if matches.len() >= MIN_CONTAINER_MATCHES {
            return Some(matches);
        }
        if fallback.is_none() && !matches.is_empty() {
            fallback = Some(matches);
        }
    }

    fallback
}

fn compile(selectors: &[&str]) -> Vec<Selector> {
    selectors
        .iter()
        .filter_map(|css| Selector::parse(css).ok())
        .collect()
}

fn link_title(link: ElementRef<'_>, separator: &str) -> Option<String> {
    let from_attr = link
        .value()
        .attr("title")
        .map(normalize_whitespace)
        .filter(|t| !t.is_empty());

    from_attr
        .or_else(|| Some(element_text(link, separator)))
        .filter(|t| !t.is_empty())
}

fn element_text(element: ElementRef<'_>, separator: &str) -> String {
    let joined = element
        .text()
        .map(str::trim)
        .filter(|fragment| !fragment.is_empty())
        .collect::<Vec<_>>()
        .join(separator);
    normalize_whitespace(&joined)
}

pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
