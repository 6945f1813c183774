//! Ordered trial-and-error over selector candidates.
//!
//! The target portal's markup is not stable, so every element the pipeline
//! touches is described by a ranked list of candidate selectors. Candidates
//! are tried strictly in declared order; a candidate that errors or times out
//! is a miss, never a fault, and the first hit short-circuits the rest.

use std::future::Future;
use std::time::Duration;

use fantoccini::{Client, Locator, elements::Element};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    FillText,
    Click,
    WaitVisible,
}

impl ActionKind {
    /// Click targets must actually be rendered; form fields only need to be
    /// present in the DOM (some portal themes keep them transiently hidden).
    fn requires_visible(self) -> bool {
        matches!(self, ActionKind::Click | ActionKind::WaitVisible)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SelectorCandidate {
    pub selector: &'static str,
    pub action: ActionKind,
}

impl SelectorCandidate {
    pub const fn fill(selector: &'static str) -> Self {
        Self {
            selector,
            action: ActionKind::FillText,
        }
    }

    pub const fn click(selector: &'static str) -> Self {
        Self {
            selector,
            action: ActionKind::Click,
        }
    }
}

#[derive(Debug)]
pub enum Resolution<E> {
    Match { selector: &'static str, element: E },
    NotFound { attempted: Vec<&'static str> },
}

/// Ordered-trial core, generic over the probe so the policy is testable
/// without a WebDriver. The probe returns `Some(element)` on a hit and `None`
/// on a miss of any kind.
pub async fn resolve_with<E, F, Fut>(candidates: &[SelectorCandidate], mut probe: F) -> Resolution<E>
where
    F: FnMut(SelectorCandidate) -> Fut,
    Fut: Future<Output = Option<E>>,
{
    let mut attempted = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        attempted.push(candidate.selector);
        if let Some(element) = probe(*candidate).await {
            debug!(selector = candidate.selector, "selector candidate matched");
            return Resolution::Match {
                selector: candidate.selector,
                element,
            };
        }
        debug!(selector = candidate.selector, "selector candidate missed");
    }
    Resolution::NotFound { attempted }
}

/// Resolve against a live page: wait up to `per_candidate` for each candidate
/// in turn. WebDriver errors (bad selector, timeout, stale page) count as
/// misses for that candidate only.
pub async fn resolve(
    client: &Client,
    candidates: &[SelectorCandidate],
    per_candidate: Duration,
) -> Resolution<Element> {
    resolve_with(candidates, |candidate| {
        probe_selector(client, candidate, per_candidate)
    })
    .await
}

async fn probe_selector(
    client: &Client,
    candidate: SelectorCandidate,
    timeout: Duration,
) -> Option<Element> {
    let element = client
        .wait()
        .at_most(timeout)
        .for_element(Locator::Css(candidate.selector))
        .await
        .ok()?;

    if candidate.action.requires_visible() && !element.is_displayed().await.unwrap_or(false) {
        return None;
    }
    Some(element)
}

/// Multi-element selection used by the detail-view stage: candidates are
/// pre-ranked by specificity, so an earlier selector's match wins even when a
/// later selector's match would also qualify. Within one selector, DOM order
/// decides. The filter is a lower-cased substring test against `keywords`.
pub fn pick_keyword_match<E>(
    groups: Vec<(&'static str, Vec<(E, String)>)>,
    keywords: &[&str],
) -> Option<(&'static str, E)> {
    for (selector, elements) in groups {
        for (element, text) in elements {
            let text = text.to_lowercase();
            if keywords.iter().any(|keyword| text.contains(keyword)) {
                return Some((selector, element));
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::future::ready;

    const CANDIDATES: &[SelectorCandidate] = &[
        SelectorCandidate::fill("#a"),
        SelectorCandidate::fill("#b"),
        SelectorCandidate::fill("#c"),
    ];

    #[test]
    fn first_match_short_circuits() {
        let probed = RefCell::new(Vec::new());
        let resolution = tokio_test::block_on(resolve_with(CANDIDATES, |c| {
            probed.borrow_mut().push(c.selector);
            ready((c.selector == "#b").then_some(42))
        }));

        match resolution {
            Resolution::Match { selector, element } => {
                assert_eq!(selector, "#b");
                assert_eq!(element, 42);
            }
            Resolution::NotFound { .. } => panic!("expected a match"),
        }
        // "#c" must never be probed once "#b" matched
        assert_eq!(*probed.borrow(), vec!["#a", "#b"]);
    }

    #[test]
    fn exhausted_chain_lists_all_attempted() {
        let resolution: Resolution<u32> =
            tokio_test::block_on(resolve_with(CANDIDATES, |_| ready(None)));
        match resolution {
            Resolution::NotFound { attempted } => {
                assert_eq!(attempted, vec!["#a", "#b", "#c"]);
            }
            Resolution::Match { .. } => panic!("expected NotFound"),
        }
    }

    #[test]
    fn empty_candidate_list_is_not_found() {
        let resolution: Resolution<u32> = tokio_test::block_on(resolve_with(&[], |_| ready(Some(1))));
        assert!(matches!(
            resolution,
            Resolution::NotFound { attempted } if attempted.is_empty()
        ));
    }

    #[test]
    fn higher_ranked_selector_wins_over_dom_order() {
        // Set A outranks set B; both contain a qualifying element. The set A
        // element must win even though set B's qualifying entry came earlier
        // in its own DOM scan.
        let groups = vec![
            ("a.btn.btn-primary", vec![
                (1, "Düzenle".to_string()),
                (2, "Kalite Kontrol Yap".to_string()),
            ]),
            ("a.btn", vec![(3, "Kalite Kontrol Yap".to_string())]),
        ];
        let picked = pick_keyword_match(groups, &["kalite", "kontrol", "qc"]);
        assert_eq!(picked, Some(("a.btn.btn-primary", 2)));
    }

    #[test]
    fn keyword_filter_is_case_insensitive() {
        let groups = vec![("button.btn", vec![(9, "KALİTE KONTROL".to_string())])];
        // Turkish dotted İ lowercases to i̇ (i + combining dot); "kontrol"
        // still matches on substring.
        let picked = pick_keyword_match(groups, &["kontrol"]);
        assert_eq!(picked, Some(("button.btn", 9)));
    }

    #[test]
    fn no_qualifying_text_yields_none() {
        let groups = vec![
            ("a.btn", vec![(1, "Düzenle".to_string()), (2, "Sil".to_string())]),
            ("button.btn", vec![]),
        ];
        assert_eq!(pick_keyword_match(groups, &["kalite", "qc"]), None);
    }
}
