//! The four-stage automation pipeline: Authenticate → Locate → OpenDetail →
//! Extract, with a universal failure path and a whole-request deadline.
//!
//! Every stage is built from fallback chains over candidate selectors
//! (`resolver`). A chain miss is only fatal when the stage has no alternate
//! branch; stage failures escalate and terminate the request with a
//! torn-down session. No stage is retried; callers retry whole requests.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use chrono::Local;
use fantoccini::elements::Element;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::barcode::Barcode;
use crate::config::Config;
use crate::error::{Result, ScrapeError};
use crate::extract::{self, ExtractionMethod};
use crate::resolver::{self, Resolution, SelectorCandidate};
use crate::session::BrowserSession;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Authenticate,
    Locate,
    OpenDetail,
    Extract,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Authenticate => "authenticate",
            Self::Locate => "locate",
            Self::OpenDetail => "open-detail",
            Self::Extract => "extract",
        })
    }
}

/// Extracted result of a completed pipeline run.
#[derive(Debug, Clone)]
pub struct PartsRecord {
    /// Parts text in document order; never deduplicated.
    pub parts: Vec<String>,
    /// Empty when the page carries no technician line.
    pub technician: String,
    /// Equals `parts.len()` except on the degraded path, where it reports the
    /// pre-cap row total.
    pub parts_count: usize,
    pub fetched_at: String,
    pub method: ExtractionMethod,
}

/// Which page Extract operates on: the opened detail view, or the original
/// result listing when no detail button could be found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageMode {
    Detail,
    DegradedListing,
}

enum PipelineState {
    Authenticate,
    Locate,
    OpenDetail,
    Extract(PageMode),
    Done(PartsRecord),
}

/// Visible-text keywords marking the detail action ("quality check" words).
const ACTION_KEYWORDS: &[&str] = &["kalite", "kontrol", "qc", "detay"];

const NOT_FOUND_CAUSE: &str =
    "Kalite kontrol butonu bulunamadı - Barkod sistemde olmayabilir veya sayfa yapısı değişmiş";

const EMAIL_FIELDS: &[SelectorCandidate] = &[
    SelectorCandidate::fill("input[type=\"email\"]"),
    SelectorCandidate::fill("input[name=\"email\"]"),
    SelectorCandidate::fill("input#email"),
    SelectorCandidate::fill("input[placeholder*=\"email\" i]"),
    SelectorCandidate::fill("input[placeholder*=\"e-posta\" i]"),
];

const PASSWORD_FIELDS: &[SelectorCandidate] = &[
    SelectorCandidate::fill("input[type=\"password\"]"),
    SelectorCandidate::fill("input[name=\"password\"]"),
    SelectorCandidate::fill("input#password"),
    SelectorCandidate::fill("input[placeholder*=\"password\" i]"),
    SelectorCandidate::fill("input[placeholder*=\"şifre\" i]"),
];

const SUBMIT_CONTROLS: &[SelectorCandidate] = &[
    SelectorCandidate::click("button[type=\"submit\"]"),
    SelectorCandidate::click("input[type=\"submit\"]"),
    SelectorCandidate::click("button.btn-primary"),
    SelectorCandidate::click("input[value*=\"Giriş\" i]"),
];

const SEARCH_FIELDS: &[SelectorCandidate] = &[
    SelectorCandidate::fill("input.form-control.form-control-sm"),
    SelectorCandidate::fill("input[type=\"search\"]"),
    SelectorCandidate::fill("input[placeholder*=\"Ara\" i]"),
    SelectorCandidate::fill("input.search"),
    SelectorCandidate::fill("#search"),
];

/// Ranked by specificity; earlier selectors' matches win
/// (`resolver::pick_keyword_match`).
const DETAIL_BUTTONS: &[SelectorCandidate] = &[
    SelectorCandidate::click("a.btn.btn-primary"),
    SelectorCandidate::click("button.btn.btn-primary"),
    SelectorCandidate::click("a[href*=\"qc\"]"),
    SelectorCandidate::click("a.btn"),
    SelectorCandidate::click("button.btn"),
];

/// Run the whole pipeline for one barcode: acquire an exclusive browser
/// session, drive the stages under the request deadline, and tear the
/// session down on every exit path.
pub async fn scrape(config: &Config, endpoint: &str, barcode: &Barcode) -> Result<PartsRecord> {
    info!(%barcode, "🔍 starting portal scrape");
    let mut session = BrowserSession::launch(config, endpoint).await?;

    let outcome = timeout(
        config.request_deadline,
        StageExecutor::new(&mut session, config, barcode).run(),
    )
    .await;

    session.close().await;

    match outcome {
        Ok(result) => result,
        Err(_) => {
            warn!(deadline = ?config.request_deadline, "request deadline elapsed mid-pipeline");
            Err(ScrapeError::Timeout {
                deadline: config.request_deadline,
            })
        }
    }
}

struct StageExecutor<'a> {
    session: &'a mut BrowserSession,
    config: &'a Config,
    barcode: &'a Barcode,
}

impl<'a> StageExecutor<'a> {
    fn new(session: &'a mut BrowserSession, config: &'a Config, barcode: &'a Barcode) -> Self {
        Self {
            session,
            config,
            barcode,
        }
    }

    async fn run(mut self) -> Result<PartsRecord> {
        let mut state = PipelineState::Authenticate;
        loop {
            state = match state {
                PipelineState::Authenticate => {
                    self.authenticate().await?;
                    PipelineState::Locate
                }
                PipelineState::Locate => {
                    self.locate().await?;
                    PipelineState::OpenDetail
                }
                PipelineState::OpenDetail => PipelineState::Extract(self.open_detail().await?),
                PipelineState::Extract(mode) => PipelineState::Done(self.extract(mode).await?),
                PipelineState::Done(record) => return Ok(record),
            };
        }
    }

    /// Fill credentials and submit. Login success is deliberately not
    /// verified here; a failed login surfaces later as a Locate or
    /// OpenDetail miss (preserved portal-compatible behavior).
    async fn authenticate(&mut self) -> Result<()> {
        info!("🔐 authenticating against the portal");
        self.session.goto(&self.config.qc_list_url).await?;
        sleep(self.config.page_settle).await;

        let email = self.config.portal_email.clone().unwrap_or_default();
        let password = self.config.portal_password.clone().unwrap_or_default();

        self.fill_required(
            Stage::Authenticate,
            "Email input",
            EMAIL_FIELDS,
            self.config.field_timeout,
            &email,
        )
        .await?;
        let password_field = self
            .fill_required(
                Stage::Authenticate,
                "Password input",
                PASSWORD_FIELDS,
                self.config.field_timeout,
                &password,
            )
            .await?;

        match resolver::resolve(
            self.session.webdriver()?,
            SUBMIT_CONTROLS,
            self.config.submit_timeout,
        )
        .await
        {
            Resolution::Match { selector, element } => {
                element.click().await?;
                info!(selector, "login form submitted");
            }
            Resolution::NotFound { attempted } => {
                // Recoverable miss: a keyboard submit works on every theme
                // of the login form seen so far.
                debug!(?attempted, "no submit control matched, sending Enter");
                self.session.press_enter(&password_field).await?;
            }
        }

        sleep(self.config.login_settle).await;
        Ok(())
    }

    /// Reach the QC list and submit the barcode search.
    async fn locate(&mut self) -> Result<()> {
        let current = self.session.current_url().await?;
        if !current.contains(list_marker(&self.config.qc_list_url)) {
            info!(%current, "not on the QC list, navigating");
            self.session.goto(&self.config.qc_list_url).await?;
            sleep(self.config.page_settle).await;
        }

        info!(barcode = %self.barcode, "🔍 submitting barcode search");
        let search_field = self
            .fill_required(
                Stage::Locate,
                "Arama input",
                SEARCH_FIELDS,
                self.config.field_timeout,
                self.barcode.as_str(),
            )
            .await?;
        self.session.press_enter(&search_field).await?;

        // Results render asynchronously and the page exposes no completion
        // signal; the settle interval has to cover slow server-side renders.
        info!(settle = ?self.config.search_settle, "waiting for results to render");
        sleep(self.config.search_settle).await;

        if self.config.debug_screenshots {
            self.session
                .screenshot_to(Path::new("debug-after-search.png"))
                .await;
        }

        let marker = self.session.current_url().await?;
        info!(url = %marker, "search submitted");
        Ok(())
    }

    /// Find the detail action button and open the detail view, or fall back
    /// to extracting from the listing itself when the page shows result rows
    /// but no button.
    async fn open_detail(&mut self) -> Result<PageMode> {
        info!("looking for the detail action button");

        let mut chosen: Option<(&'static str, Element)> = None;
        for candidate in DETAIL_BUTTONS {
            let resolution = resolver::resolve(
                self.session.webdriver()?,
                std::slice::from_ref(candidate),
                self.config.button_timeout,
            )
            .await;
            if !matches!(resolution, Resolution::Match { .. }) {
                continue;
            }

            let elements = self.session.find_all(candidate.selector).await?;
            debug!(
                selector = candidate.selector,
                count = elements.len(),
                "candidate selector matched elements"
            );

            let mut matches = Vec::with_capacity(elements.len());
            for element in elements {
                match element.text().await {
                    Ok(text) => matches.push((element, text)),
                    Err(e) => {
                        debug!(selector = candidate.selector, "skipping unreadable element: {e}")
                    }
                }
            }

            if let Some(hit) =
                resolver::pick_keyword_match(vec![(candidate.selector, matches)], ACTION_KEYWORDS)
            {
                chosen = Some(hit);
                break;
            }
        }

        let Some((selector, button)) = chosen else {
            // Degraded path: some result layouts render rows without any
            // per-row action. If the page shows generic result markers,
            // extract from it directly; otherwise the record does not exist
            // or the page structure changed.
            let html = self.session.page_source().await?;
            if extract::has_result_markers(&html) {
                warn!("no action button, but the page shows result rows; extracting in place");
                return Ok(PageMode::DegradedListing);
            }
            warn!("no action button and no result markers");
            return Err(ScrapeError::StageFailed {
                stage: Stage::OpenDetail,
                cause: NOT_FOUND_CAUSE.to_string(),
            });
        };

        info!(selector, "✅ action button found");
        self.session.scroll_into_view(&button).await?;
        sleep(self.config.page_settle).await;

        match button.attr("href").await? {
            Some(href) if !href.is_empty() => {
                info!("action button carries a link, navigating directly");
                self.session.goto(&href).await?;
            }
            _ => {
                // Bounded race: the click may navigate in place or open a
                // new window. Snapshot handles first, then watch for a new
                // one; if none appears within the window the original page
                // stays active.
                let before = self.session.window_handles().await?;
                if let Err(e) = button.click().await {
                    warn!("action button click failed: {e}");
                }
                if self
                    .session
                    .adopt_new_window(&before, self.config.new_window_wait)
                    .await?
                {
                    sleep(self.config.page_settle).await;
                }
            }
        }

        sleep(self.config.detail_settle).await;
        Ok(PageMode::Detail)
    }

    /// Run the extraction heuristics against whichever page is active.
    async fn extract(&mut self, mode: PageMode) -> Result<PartsRecord> {
        info!(?mode, "📊 extracting parts data");

        if self.config.debug_screenshots {
            self.session
                .screenshot_to(Path::new("debug-parts-page.png"))
                .await;
        }

        let html = self.session.page_source().await?;
        let body_text = self.session.body_text().await.unwrap_or_default();

        let (parts, parts_count, method) = match mode {
            PageMode::DegradedListing => {
                let Some(scanned) =
                    extract::degraded_scan(&html, &body_text, self.config.max_degraded_parts)
                else {
                    // Rows were present but nothing parts-like in them; treat
                    // as the record not being found at all.
                    return Err(ScrapeError::StageFailed {
                        stage: Stage::Extract,
                        cause: NOT_FOUND_CAUSE.to_string(),
                    });
                };
                (scanned.parts, scanned.total, ExtractionMethod::DegradedScan)
            }
            PageMode::Detail => {
                let (parts, method) = extract::labeled_section(&html);
                let count = parts.len();
                (parts, count, method)
            }
        };

        let technician = extract::technician(&body_text);
        let fetched_at = Local::now().format("%d.%m.%Y %H:%M:%S").to_string();

        info!(
            parts = parts.len(),
            method = method.as_str(),
            "✅ extraction complete"
        );

        Ok(PartsRecord {
            parts,
            technician,
            parts_count,
            fetched_at,
            method,
        })
    }

    async fn fill_required(
        &self,
        stage: Stage,
        target: &'static str,
        candidates: &[SelectorCandidate],
        per_candidate: Duration,
        text: &str,
    ) -> Result<Element> {
        match resolver::resolve(self.session.webdriver()?, candidates, per_candidate).await {
            Resolution::Match { selector, element } => {
                element.send_keys(text).await?;
                info!(selector, "{target} filled");
                Ok(element)
            }
            Resolution::NotFound { attempted } => {
                warn!(?attempted, "{target} not matched by any candidate");
                Err(ScrapeError::ResolverMiss {
                    stage,
                    target,
                    attempted,
                })
            }
        }
    }
}

/// Marker segment used to tell whether the browser is already on the target
/// list view (last non-empty path segment of the configured URL).
fn list_marker(qc_list_url: &str) -> &str {
    qc_list_url
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or("qc_list")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_marker_takes_last_path_segment() {
        assert_eq!(
            list_marker("https://bayi.mobilfon.com/mobilfon_framework/admin/qc_list"),
            "qc_list"
        );
        assert_eq!(list_marker("https://portal.example.com/admin/quality/"), "quality");
    }

    #[test]
    fn stage_names_are_stable() {
        assert_eq!(Stage::Authenticate.to_string(), "authenticate");
        assert_eq!(Stage::OpenDetail.to_string(), "open-detail");
    }

    #[test]
    fn detail_buttons_are_ranked_most_specific_first() {
        // The first candidates must be the class-qualified ones; the broad
        // `a.btn`/`button.btn` sweeps come last.
        assert_eq!(DETAIL_BUTTONS.first().unwrap().selector, "a.btn.btn-primary");
        assert_eq!(DETAIL_BUTTONS.last().unwrap().selector, "button.btn");
    }

    #[test]
    fn action_keywords_cover_quality_and_detail_words() {
        for keyword in ["kalite", "kontrol", "qc", "detay"] {
            assert!(ACTION_KEYWORDS.contains(&keyword));
        }
    }
}
