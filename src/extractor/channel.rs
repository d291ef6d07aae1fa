//! Markup knowledge for each retail channel.
//!
//! Retailers redesign their pages without notice, so every location is a
//! list of candidates tried in order. Adjust these tables when a site changes.

use crate::entities::Channel;

/// Where to look for listing data on one channel's pages.
#[derive(Debug)]
pub struct ChannelLayout {
    /// Candidate selectors for "one listing entry", highest priority first.
    pub containers: &'static [&'static str],
    /// Candidate selectors for the entry's title link.
    pub links: &'static [&'static str],
    /// Candidate selectors for the author line.
    pub authors: &'static [&'static str],
    /// Joins the text fragments of a link when it has no `title` attribute.
    pub title_separator: &'static str,
}

static BOOKS_COM_TW: ChannelLayout = ChannelLayout {
    containers: &[
        "ul#itemlist li",
        "div.mod_a li",
        "div.mod_b li",
        "li.item",
        "div.item",
    ],
    links: &["a[title]", "a[href]"],
    authors: &[
        "p.author",
        "div.author",
        "li.author",
        "span.author",
        "p > a[rel='goAuthor']",
    ],
    title_separator: "",
};

static ESLITE: ChannelLayout = ChannelLayout {
    containers: &[
        "div.product-item",
        "li.product-item",
        "li.ProductCard",
        "div.ProductCard",
        "ul.product-list li",
        "div.product-list li",
    ],
    links: &["a[href]"],
    authors: &["div.author", "p.author", "span.author"],
    title_separator: " ",
};

pub fn layout(channel: Channel) -> &'static ChannelLayout {
    match channel {
        Channel::BooksComTw => &BOOKS_COM_TW,
        Channel::Eslite => &ESLITE,
    }
}
