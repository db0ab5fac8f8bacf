use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use shelfscan_core::CleanedProductRecord;

use crate::detect::{SiteAnalysis, SiteType};

/// Cooperative cancellation shared between a run and whoever may stop it
/// (typically a Ctrl-C handler). Checked once per page.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Why a run stopped following pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    NoNextPage,
    PageCap,
    ConsecutiveEmptyPages,
    Cancelled,
    FetchFailed,
    RobotsDisallowed,
    InvalidUrl,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            StopReason::NoNextPage => "no next page",
            StopReason::PageCap => "page cap reached",
            StopReason::ConsecutiveEmptyPages => "consecutive empty pages",
            StopReason::Cancelled => "cancelled",
            StopReason::FetchFailed => "fetch failed",
            StopReason::RobotsDisallowed => "disallowed by robots.txt",
            StopReason::InvalidUrl => "invalid start URL",
        })
    }
}

/// Outcome of one scraping run. Always carries whatever was collected before
/// the run stopped.
#[derive(Debug, Clone, Serialize)]
pub struct ScrapeReport {
    pub products: Vec<CleanedProductRecord>,
    pub pages_visited: usize,
    /// Records extracted before cleaning and de-duplication.
    pub raw_count: usize,
    pub stop_reason: StopReason,
    /// Non-fatal problems met along the way, in order.
    pub errors: Vec<String>,
    pub engine: SiteType,
    pub site_analysis: Option<SiteAnalysis>,
}

impl ScrapeReport {
    pub(crate) fn stopped(stop_reason: StopReason) -> Self {
        Self {
            products: Vec::new(),
            pages_visited: 0,
            raw_count: 0,
            stop_reason,
            errors: Vec::new(),
            engine: SiteType::Static,
            site_analysis: None,
        }
    }
}
