use std::fmt;
use std::time::Duration;

use crate::pipeline::Stage;

#[derive(Debug)]
pub enum ScrapeError {
    /// Bad input, rejected before any browser resource is allocated.
    Validation(String),
    /// A fallback chain was exhausted and the stage had no alternate path.
    ResolverMiss {
        stage: Stage,
        target: &'static str,
        attempted: Vec<&'static str>,
    },
    /// A stage failed with no further fallback.
    StageFailed { stage: Stage, cause: String },
    /// The per-request deadline elapsed.
    Timeout { deadline: Duration },
    /// WebDriver command fault.
    Browser(fantoccini::error::CmdError),
    /// Session-level fault (connect, teardown, closed handle).
    Session(String),
    Generic(anyhow::Error),
}

impl ScrapeError {
    /// Taxonomy tag carried in the `error` field of failure responses.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "ValidationError",
            Self::ResolverMiss { .. } => "ResolverMiss",
            Self::StageFailed { .. } => "StageFailure",
            Self::Timeout { .. } => "TimeoutExceeded",
            Self::Browser(_) | Self::Session(_) | Self::Generic(_) => "UnexpectedBrowserFailure",
        }
    }
}

impl fmt::Display for ScrapeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation(msg) => write!(f, "{msg}"),
            Self::ResolverMiss {
                stage,
                target,
                attempted,
            } => write!(
                f,
                "{target} bulunamadı ({stage}: {} selectors tried)",
                attempted.len()
            ),
            Self::StageFailed { stage, cause } => write!(f, "{cause} ({stage})"),
            Self::Timeout { deadline } => {
                write!(f, "İşlem zaman aşımına uğradı ({deadline:?} deadline)")
            }
            Self::Browser(e) => write!(f, "WebDriver command error: {e}"),
            Self::Session(msg) => write!(f, "Session error: {msg}"),
            Self::Generic(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for ScrapeError {}

impl From<fantoccini::error::CmdError> for ScrapeError {
    fn from(err: fantoccini::error::CmdError) -> Self {
        Self::Browser(err)
    }
}

impl From<fantoccini::error::NewSessionError> for ScrapeError {
    fn from(err: fantoccini::error::NewSessionError) -> Self {
        Self::Session(format!("WebDriver session creation failed: {err}"))
    }
}

impl From<anyhow::Error> for ScrapeError {
    fn from(err: anyhow::Error) -> Self {
        Self::Generic(err)
    }
}

pub type Result<T> = std::result::Result<T, ScrapeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_tags_match_taxonomy() {
        let miss = ScrapeError::ResolverMiss {
            stage: Stage::Authenticate,
            target: "Email input",
            attempted: vec!["input#email"],
        };
        assert_eq!(miss.kind(), "ResolverMiss");

        let failed = ScrapeError::StageFailed {
            stage: Stage::OpenDetail,
            cause: "no action button".into(),
        };
        assert_eq!(failed.kind(), "StageFailure");

        let timeout = ScrapeError::Timeout {
            deadline: Duration::from_secs(120),
        };
        assert_eq!(timeout.kind(), "TimeoutExceeded");

        assert_eq!(
            ScrapeError::Session("gone".into()).kind(),
            "UnexpectedBrowserFailure"
        );
    }

    #[test]
    fn resolver_miss_display_counts_attempts() {
        let miss = ScrapeError::ResolverMiss {
            stage: Stage::Locate,
            target: "Arama input",
            attempted: vec!["#search", "input.search"],
        };
        let msg = miss.to_string();
        assert!(msg.contains("Arama input bulunamadı"));
        assert!(msg.contains("2 selectors"));
    }
}
