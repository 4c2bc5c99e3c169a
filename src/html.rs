//! Small helpers over `scraper` shared by the source extractors.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

static PARENTHETICAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\(.*\)").unwrap());
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

pub static DT: Lazy<Selector> = Lazy::new(|| Selector::parse("dt").unwrap());
pub static TR: Lazy<Selector> = Lazy::new(|| Selector::parse("tr").unwrap());
pub static TD: Lazy<Selector> = Lazy::new(|| Selector::parse("td").unwrap());
pub static TH: Lazy<Selector> = Lazy::new(|| Selector::parse("th").unwrap());
pub static ANCHOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a").unwrap());
pub static H2: Lazy<Selector> = Lazy::new(|| Selector::parse("h2").unwrap());
pub static P: Lazy<Selector> = Lazy::new(|| Selector::parse("p").unwrap());

/// Concatenated text of an element, trimmed.
pub fn element_text(el: &ElementRef) -> String {
    el.text().collect::<String>().trim().to_string()
}

/// Trimmed, non-empty text nodes in document order.
pub fn text_parts(el: &ElementRef) -> Vec<String> {
    el.text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn collapse_whitespace(text: &str) -> String {
    WHITESPACE.replace_all(text.trim(), " ").into_owned()
}

/// Removes everything from the first `(` to the last `)`.
pub fn strip_parenthetical(text: &str) -> String {
    PARENTHETICAL.replace_all(text, "").trim().to_string()
}

pub fn first<'a>(scope: &ElementRef<'a>, selector: &Selector) -> Option<ElementRef<'a>> {
    scope.select(selector).next()
}

pub fn first_in_doc<'a>(doc: &'a Html, selector: &Selector) -> Option<ElementRef<'a>> {
    doc.select(selector).next()
}

pub fn next_sibling_element<'a>(el: &ElementRef<'a>) -> Option<ElementRef<'a>> {
    el.next_siblings().find_map(ElementRef::wrap)
}

/// First element matching `selector` whose trimmed text equals `label`.
pub fn find_by_text<'a>(doc: &'a Html, selector: &Selector, label: &str) -> Option<ElementRef<'a>> {
    doc.select(selector).find(|el| element_text(el) == label)
}

/// The `dd` (or whatever element) that follows the `dt` labelled `label`.
pub fn definition<'a>(doc: &'a Html, label: &str) -> Option<ElementRef<'a>> {
    find_by_text(doc, &DT, label).and_then(|dt| next_sibling_element(&dt))
}

/// Outer HTML of `el` with the first descendant matching `removed` cut out.
pub fn html_without(el: &ElementRef, removed: &Selector) -> String {
    let outer = el.html();
    match el.select(removed).next() {
        Some(child) => outer.replacen(&child.html(), "", 1),
        None => outer,
    }
}

/// Text of `el` ignoring every text node under the first descendant matching
/// `removed`.
pub fn text_without(el: &ElementRef, removed: &Selector) -> String {
    let excluded = el.select(removed).next().map(|child| child.id());
    el.descendants()
        .filter(|node| match excluded {
            Some(id) => !node.ancestors().any(|a| a.id() == id),
            None => true,
        })
        .filter_map(|node| node.value().as_text().map(|t| t.text.to_string()))
        .collect::<String>()
        .trim()
        .to_string()
}

/// Markup of the siblings after `el`, text included, up to (not including)
/// the first element named `stop`.
pub fn siblings_html_until(el: &ElementRef, stop: &str) -> String {
    let mut html = String::new();
    for node in el.next_siblings() {
        if let Some(sibling) = ElementRef::wrap(node) {
            if sibling.value().name() == stop {
                break;
            }
            html.push_str(&sibling.html());
        } else if let Some(text) = node.value().as_text() {
            html.push_str(text);
        }
    }
    html
}

/// Upper-cases the first character and lower-cases the rest.
pub fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// Joins a site-relative href onto `base`; absolute hrefs pass through.
pub fn absolute_url(base: &str, href: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        href.to_string()
    } else if href.starts_with('/') {
        format!("{}{}", base.trim_end_matches('/'), href)
    } else {
        format!("{}/{}", base.trim_end_matches('/'), href)
    }
}
