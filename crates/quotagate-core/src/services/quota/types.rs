//! Quota accounting types
//!
//! Types shared by the quota stores, the provider registry and the dispatcher.

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Capability
// ============================================================================

/// Category of work a provider performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Web search returning title/url/snippet entries
    Search,
    /// Page scraping returning raw content
    Scrape,
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Capability::Search => write!(f, "search"),
            Capability::Scrape => write!(f, "scrape"),
        }
    }
}

impl std::str::FromStr for Capability {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "search" => Ok(Capability::Search),
            "scrape" | "scraping" => Ok(Capability::Scrape),
            _ => Err(format!("Unknown capability: {}", s)),
        }
    }
}

// ============================================================================
// Window Types
// ============================================================================

/// Period after which a provider's remaining credits return to its limit
///
/// Boundaries are calendar based in local time:
/// - `Day`: next midnight
/// - `Month`: first instant of the next calendar month
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotaWindow {
    #[serde(alias = "daily")]
    Day,
    #[serde(alias = "monthly")]
    Month,
}

impl std::fmt::Display for QuotaWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QuotaWindow::Day => write!(f, "day"),
            QuotaWindow::Month => write!(f, "month"),
        }
    }
}

impl std::str::FromStr for QuotaWindow {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "day" | "daily" => Ok(QuotaWindow::Day),
            "month" | "monthly" => Ok(QuotaWindow::Month),
            _ => Err(format!("Unknown window type: {}", s)),
        }
    }
}

impl QuotaWindow {
    /// Next window boundary strictly after `now`, in the machine's local time zone
    pub fn next_reset_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.next_reset_in(now, &chrono::Local)
    }

    /// Next window boundary strictly after `now`, evaluated in `tz`
    pub fn next_reset_in<Tz: TimeZone>(&self, now: DateTime<Utc>, tz: &Tz) -> DateTime<Utc> {
        let today = now.with_timezone(tz).date_naive();

        let next_date = match self {
            QuotaWindow::Day => today.succ_opt(),
            QuotaWindow::Month => {
                let (year, month) = if today.month() == 12 {
                    (today.year() + 1, 1)
                } else {
                    (today.year(), today.month() + 1)
                };
                NaiveDate::from_ymd_opt(year, month, 1)
            }
        }
        .unwrap_or(NaiveDate::MAX);

        let midnight = next_date.and_time(NaiveTime::MIN);

        // Midnight can fall inside a DST gap; take the first valid instant.
        tz.from_local_datetime(&midnight)
            .earliest()
            .unwrap_or_else(|| tz.from_utc_datetime(&midnight))
            .with_timezone(&Utc)
    }
}

// ============================================================================
// Records
// ============================================================================

/// Current accounting state for one provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuotaRecord {
    /// Provider identity (e.g. "google")
    pub provider: String,
    /// Credits available per window
    pub limit: i64,
    /// Credits left in the current window (never negative)
    pub remaining: i64,
    /// Window type
    pub window: QuotaWindow,
    /// When the current window ends
    pub reset_at: DateTime<Utc>,
}

impl QuotaRecord {
    /// Create a fresh record with the full limit available
    pub fn new(provider: impl Into<String>, limit: i64, window: QuotaWindow, now: DateTime<Utc>) -> Self {
        Self {
            provider: provider.into(),
            limit,
            remaining: limit,
            window,
            reset_at: window.next_reset_after(now),
        }
    }

    /// Credits consumed in the current window
    pub fn used(&self) -> i64 {
        (self.limit - self.remaining).max(0)
    }

    /// A provider is active while it has credits left
    pub fn is_active(&self) -> bool {
        self.remaining > 0
    }

    /// Percentage of the limit consumed (0.0 - 100.0)
    pub fn utilization_pct(&self) -> f64 {
        if self.limit <= 0 {
            return 100.0;
        }
        let pct = self.used() as f64 / self.limit as f64 * 100.0;
        (pct * 100.0).round() / 100.0
    }

    /// Whether the window has elapsed at `now`
    pub fn needs_rollover(&self, now: DateTime<Utc>) -> bool {
        now >= self.reset_at
    }
}

/// Result of an atomic consume
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumeOutcome {
    /// Whether the credits were granted
    pub allowed: bool,
    /// Remaining credits after the operation
    pub remaining: i64,
    /// Remaining credits before the debit, after any rollover
    pub previous: i64,
}

impl ConsumeOutcome {
    /// This consume took the provider from active to exhausted
    pub fn deactivated(&self) -> bool {
        self.previous > 0 && self.remaining == 0
    }
}

/// Target of an administrative reset
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResetTarget {
    All,
    Provider(String),
}

impl ResetTarget {
    /// Parse "all" (case-insensitive) or a provider name
    pub fn parse(value: &str) -> Self {
        let trimmed = value.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("all") {
            ResetTarget::All
        } else {
            ResetTarget::Provider(trimmed.to_string())
        }
    }
}

impl std::fmt::Display for ResetTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResetTarget::All => write!(f, "all"),
            ResetTarget::Provider(name) => write!(f, "{}", name),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
