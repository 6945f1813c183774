//! DOM-content heuristics for the parts detail page.
//!
//! Two tiers: a labeled-section scan anchored on a "parts" heading, and a
//! degraded full-page row scan for result listings that never exposed a
//! detail view. Both operate on the HTML of whichever page is active, parsed
//! with `scraper`, so they run (and test) without a live browser.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

static HEADING_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("h1, h2, h3, h4, h5, strong, b").unwrap());
static ITEM_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("li, tr, .part-item, .row").unwrap());
static ROW_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr, li").unwrap());
static TABLE_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("table").unwrap());
static TR_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").unwrap());
static TECHNICIAN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)teknisyen[:\s]+([^\n]+)").unwrap());

/// Keywords that mark a heading as the parts section.
const PARTS_HEADING_KEYWORDS: &[&str] = &["parça", "kullanılan"];
/// Item text ceiling for the labeled-section strategy (chars, exclusive).
const ITEM_TEXT_CEILING: usize = 200;
/// Row text ceiling for the degraded scan (chars, exclusive).
const ROW_TEXT_CEILING: usize = 100;
/// Rows beyond this count as a generic result marker even without a table.
const ROW_MARKER_THRESHOLD: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionMethod {
    /// Items collected from the container following a parts heading.
    LabeledSection,
    /// The labeled container had no item children; its raw text was split
    /// into lines instead.
    LabeledSectionLines,
    /// Full-page row scan on the result listing (no detail view reached).
    DegradedScan,
}

impl ExtractionMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LabeledSection => "labeled-section",
            Self::LabeledSectionLines => "labeled-section-lines",
            Self::DegradedScan => "degraded-scan",
        }
    }
}

/// Labeled-section strategy: find the first heading-like element mentioning
/// parts, walk forward to its nearest `ul`/`table`/`div` sibling, and collect
/// the text of each item-like child. A page without a qualifying heading
/// yields an empty list, not an error.
pub fn labeled_section(html: &str) -> (Vec<String>, ExtractionMethod) {
    let document = Html::parse_document(html);

    let Some(heading) = document.select(&HEADING_SELECTOR).find(|h| {
        let text = element_text(*h).to_lowercase();
        PARTS_HEADING_KEYWORDS.iter().any(|k| text.contains(k))
    }) else {
        return (Vec::new(), ExtractionMethod::LabeledSection);
    };

    let Some(container) = heading
        .next_siblings()
        .filter_map(ElementRef::wrap)
        .find(|el| matches!(el.value().name(), "ul" | "table" | "div"))
    else {
        return (Vec::new(), ExtractionMethod::LabeledSection);
    };

    let parts: Vec<String> = container
        .select(&ITEM_SELECTOR)
        .filter_map(|item| bounded_text(element_text(item), ITEM_TEXT_CEILING))
        .collect();

    if !parts.is_empty() {
        return (parts, ExtractionMethod::LabeledSection);
    }

    // No item-like children; fall back to splitting the container's raw text
    // block into lines under the same ceiling.
    let lines: Vec<String> = element_text(container)
        .split('\n')
        .filter_map(|line| bounded_text(line.to_string(), ITEM_TEXT_CEILING))
        .collect();
    (lines, ExtractionMethod::LabeledSectionLines)
}

#[derive(Debug, PartialEq, Eq)]
pub struct DegradedParts {
    /// Collected rows, capped at the configured maximum.
    pub parts: Vec<String>,
    /// Row count before the cap was applied.
    pub total: usize,
}

/// Degraded full-page strategy: only meaningful when the listing mentions
/// parts at all; collects every short row/list-item text on the page, capped
/// to `max` to avoid pathological over-collection.
pub fn degraded_scan(html: &str, body_text: &str, max: usize) -> Option<DegradedParts> {
    if !body_text.to_lowercase().contains("parça") {
        return None;
    }

    let document = Html::parse_document(html);
    let mut parts: Vec<String> = document
        .select(&ROW_SELECTOR)
        .filter_map(|row| bounded_text(element_text(row), ROW_TEXT_CEILING))
        .collect();

    if parts.is_empty() {
        return None;
    }

    let total = parts.len();
    parts.truncate(max);
    Some(DegradedParts { parts, total })
}

/// Generic result markers: any table, or more than a handful of rows. Used to
/// decide whether a page with no detail button still carries search results.
pub fn has_result_markers(html: &str) -> bool {
    let document = Html::parse_document(html);
    document.select(&TABLE_SELECTOR).next().is_some()
        || document.select(&TR_SELECTOR).count() > ROW_MARKER_THRESHOLD
}

/// Case-insensitive `teknisyen: <rest-of-line>` match anywhere in the page's
/// visible text. Absence is not an error.
pub fn technician(body_text: &str) -> String {
    TECHNICIAN_RE
        .captures(body_text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default()
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>()
}

fn bounded_text(raw: String, ceiling: usize) -> Option<String> {
    let trimmed = raw.trim();
    let len = trimmed.chars().count();
    (len > 0 && len < ceiling).then(|| trimmed.to_string())
}
