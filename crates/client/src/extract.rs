//! Markup stripping for fetched pages.
//!
//! The main content root is chosen by preference (`article`, `main`,
//! `[role=main]`, `body`). Text nodes under boilerplate elements are
//! skipped and whitespace is collapsed to single spaces. Non-HTML bodies
//! are treated as plain text, except that a `text/*` body which opens with
//! a doctype or `<html>` tag is parsed as markup anyway.

use chrono::{DateTime, Utc};
use scraper::{ElementRef, Html, Selector};

use crate::dates::parse_date;

/// Elements whose text never counts as content.
const BOILERPLATE: &[&str] =
    &["script", "style", "nav", "footer", "header", "aside", "noscript", "svg", "iframe", "template"];

/// Content roots in order of preference.
const ROOTS: &[&str] = &["article", "main", "[role=\"main\"]", "body"];

/// Metadata selectors for the publication date, with the attribute to read.
const PUBLISHED: &[(&str, &str)] = &[
    ("meta[property=\"article:published_time\"]", "content"),
    ("meta[itemprop=\"datePublished\"]", "content"),
    ("meta[name=\"pubdate\"]", "content"),
    ("meta[name=\"date\"]", "content"),
    ("time[datetime]", "datetime"),
];

/// Text and metadata pulled out of a response body.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub title: Option<String>,
    /// Whitespace-collapsed text; may be empty.
    pub text: String,
    pub published_at: Option<DateTime<Utc>>,
}

/// Turns a response body into plain text.
pub trait Extractor: Send + Sync {
    fn extract(&self, body: &str, content_type: Option<&str>) -> Extraction;
}

/// scraper-based extractor used by default.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlExtractor;

impl Extractor for HtmlExtractor {
    fn extract(&self, body: &str, content_type: Option<&str>) -> Extraction {
        if !looks_like_html(body, content_type) {
            return Extraction { title: None, text: collapse_whitespace(body), published_at: None };
        }

        let document = Html::parse_document(body);
        Extraction {
            title: extract_title(&document),
            text: extract_main_text(&document),
            published_at: extract_published(&document),
        }
    }
}

fn looks_like_html(body: &str, content_type: Option<&str>) -> bool {
    let head = body.trim_start();
    let lead = head.get(..512).unwrap_or(head).to_ascii_lowercase();
    match content_type.map(str::to_ascii_lowercase) {
        Some(ct) if ct.contains("html") || ct.contains("xml") => true,
        Some(ct) if ct.starts_with("text/") => lead.starts_with("<!doctype html") || lead.starts_with("<html"),
        _ => head.starts_with('<') || lead.contains("<html"),
    }
}

/// Collapse every whitespace run to one space and trim.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn select_first<'a>(document: &'a Html, selector: &str) -> Option<ElementRef<'a>> {
    let selector = Selector::parse(selector).ok()?;
    document.select(&selector).next()
}

fn extract_title(document: &Html) -> Option<String> {
    let og = select_first(document, "meta[property=\"og:title\"]")
        .and_then(|el| el.value().attr("content"))
        .map(collapse_whitespace);
    let title = select_first(document, "title").map(|el| collapse_whitespace(&el.text().collect::<String>()));

    title.filter(|t| !t.is_empty()).or(og).filter(|t| !t.is_empty())
}

fn extract_published(document: &Html) -> Option<DateTime<Utc>> {
    PUBLISHED.iter().find_map(|(selector, attr)| {
        select_first(document, selector)
            .and_then(|el| el.value().attr(attr))
            .and_then(parse_date)
    })
}

fn is_boilerplate(element: ElementRef<'_>) -> bool {
    BOILERPLATE.contains(&element.value().name())
}

/// Visible text below `root`, skipping boilerplate subtrees.
fn visible_text(root: ElementRef<'_>) -> String {
    let mut parts = Vec::new();
    for node in root.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node
            .ancestors()
            .filter_map(ElementRef::wrap)
            .take_while(|el| el.id() != root.id())
            .any(is_boilerplate);
        if !hidden {
            parts.push(&**text);
        }
    }
    collapse_whitespace(&parts.join(" "))
}

fn extract_main_text(document: &Html) -> String {
    for root in ROOTS {
        if let Some(element) = select_first(document, root)
            && !is_boilerplate(element)
        {
            let text = visible_text(element);
            if !text.is_empty() {
                return text;
            }
        }
    }
    visible_text(document.root_element())
}
