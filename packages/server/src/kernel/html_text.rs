//! HTML to plain-text helpers shared by the fetch tiers.

use lazy_static::lazy_static;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

/// Upper bound on extracted content handed to the extractor.
pub const MAX_CONTENT_CHARS: usize = 20_000;

/// Elements whose text is never content.
const NON_CONTENT_TAGS: &[&str] = &["script", "style", "noscript", "template", "svg"];

/// Page landmarks stripped before picking the main-content element.
const BOILERPLATE_TAGS: &[&str] = &["nav", "header", "footer", "aside", "iframe"];

lazy_static! {
    static ref TITLE_RE: Regex = Regex::new(r"(?is)<title[^>]*>(.*?)</title>").unwrap();
    static ref META_DESCRIPTION_RE: Regex = Regex::new(
        r#"(?is)<meta\s+[^>]*name\s*=\s*["']description["'][^>]*content\s*=\s*["']([^"']*)["']"#
    )
    .unwrap();
    static ref META_DESCRIPTION_REVERSED_RE: Regex = Regex::new(
        r#"(?is)<meta\s+[^>]*content\s*=\s*["']([^"']*)["'][^>]*name\s*=\s*["']description["']"#
    )
    .unwrap();
}

/// `<title>` text, whitespace-collapsed.
pub fn extract_title(html: &str) -> Option<String> {
    TITLE_RE
        .captures(html)
        .and_then(|c| c.get(1))
        .map(|m| collapse_whitespace(&decode_entities(m.as_str())))
        .filter(|t| !t.is_empty())
}

/// `<meta name="description">` content, in either attribute order.
pub fn extract_meta_description(html: &str) -> Option<String> {
    META_DESCRIPTION_RE
        .captures(html)
        .or_else(|| META_DESCRIPTION_REVERSED_RE.captures(html))
        .and_then(|c| c.get(1))
        .map(|m| collapse_whitespace(&decode_entities(m.as_str())))
        .filter(|d| !d.is_empty())
}

/// All visible text of a document: script/style/noscript dropped, tags
/// stripped, whitespace collapsed, truncated to [`MAX_CONTENT_CHARS`].
pub fn visible_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let text = element_text(document.root_element(), NON_CONTENT_TAGS);
    truncate_chars(&collapse_whitespace(&text), MAX_CONTENT_CHARS)
}

/// Text of the best-guess main-content element after stripping navigation,
/// header and footer landmarks. Falls back to the whole body.
pub fn main_content_text(html: &str) -> String {
    let document = Html::parse_document(html);

    let main_selectors = [
        "main",
        "article",
        "[role='main']",
        "#content",
        "#main",
        ".content",
        ".main",
        ".main-content",
    ];

    let skipped: Vec<&str> = NON_CONTENT_TAGS
        .iter()
        .chain(BOILERPLATE_TAGS.iter())
        .copied()
        .collect();

    for selector_str in main_selectors {
        if let Ok(selector) = Selector::parse(selector_str) {
            if let Some(main) = document.select(&selector).next() {
                let text = collapse_whitespace(&element_text(main, &skipped));
                if !text.is_empty() {
                    return truncate_chars(&text, MAX_CONTENT_CHARS);
                }
            }
        }
    }

    let text = match Selector::parse("body")
        .ok()
        .and_then(|s| document.select(&s).next())
    {
        Some(body) => element_text(body, &skipped),
        None => element_text(document.root_element(), &skipped),
    };
    truncate_chars(&collapse_whitespace(&text), MAX_CONTENT_CHARS)
}

/// Concatenate text nodes under `root`, skipping any inside `skipped` tags.
fn element_text(root: ElementRef<'_>, skipped: &[&str]) -> String {
    let mut out = String::new();
    for node in root.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let inside_skipped = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|el| skipped.contains(&el.name()))
        });
        if !inside_skipped {
            out.push_str(text);
            out.push(' ');
        }
    }
    out
}

pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Truncate on a character boundary.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

fn decode_entities(text: &str) -> String {
    text.replace("&amp;", "&")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&quot;", "\"")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&nbsp;", " ")
        .replace("&#8211;", "–")
        .replace("&#124;", "|")
}
