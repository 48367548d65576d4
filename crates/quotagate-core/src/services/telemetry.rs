//! Usage telemetry
//!
//! Every consume and reset (explicit or rollover) produces a [`UsageEvent`]. Events are written to
//! the log and kept in a fixed-capacity ring buffer that an operator (or an
//! external collector) drains over HTTP.

use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::DEFAULT_EVENT_BUFFER_CAPACITY;

// ============================================================================
// Events
// ============================================================================

/// What refilled a quota
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetCause {
    /// Administrative reset
    Manual,
    /// Window elapsed, noticed on access
    Rollover,
}

impl std::fmt::Display for ResetCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResetCause::Manual => write!(f, "manual"),
            ResetCause::Rollover => write!(f, "rollover"),
        }
    }
}

/// Quota accounting event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UsageEvent {
    /// Credits were requested from a provider's quota
    QuotaUsage {
        provider: String,
        credits: i64,
        allowed: bool,
        remaining: i64,
        timestamp: DateTime<Utc>,
    },
    /// A provider's quota was refilled
    QuotaReset {
        provider: String,
        cause: ResetCause,
        remaining: i64,
        reset_at: DateTime<Utc>,
        timestamp: DateTime<Utc>,
    },
    /// A provider ran out of credits for the current window
    ProviderDeactivation {
        provider: String,
        timestamp: DateTime<Utc>,
    },
}

// ============================================================================
// Ring Buffer
// ============================================================================

/// Fixed-capacity FIFO buffer, oldest entries evicted first
#[derive(Debug)]
pub struct BoundedBuffer<T> {
    entries: Mutex<VecDeque<T>>,
    capacity: usize,
}

impl<T> BoundedBuffer<T> {
    /// Create a buffer holding at most `capacity` entries (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append an entry, evicting the oldest if at capacity
    pub fn push(&self, entry: T) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        if entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Return every entry (oldest first) and clear the buffer in one step
    pub fn drain(&self) -> Vec<T> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.drain(..).collect()
    }
}

// ============================================================================
// Sink
// ============================================================================

/// Receiver of usage events
pub trait TelemetrySink: Send + Sync {
    fn record(&self, event: UsageEvent);
}

/// Sink that logs each event and keeps the most recent ones in memory
#[derive(Debug)]
pub struct EventRecorder {
    events: BoundedBuffer<UsageEvent>,
}

impl Default for EventRecorder {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_CAPACITY)
    }
}

impl EventRecorder {
    pub fn new(capacity: usize) -> Self {
        Self {
            events: BoundedBuffer::new(capacity),
        }
    }

    /// Drain buffered events
    pub fn drain(&self) -> Vec<UsageEvent> {
        self.events.drain()
    }
}

impl TelemetrySink for EventRecorder {
    fn record(&self, event: UsageEvent) {
        match &event {
            UsageEvent::QuotaUsage {
                provider,
                credits,
                allowed,
                remaining,
                ..
            } => log::info!(
                "[telemetry] quota_usage provider={} credits={} allowed={} remaining={}",
                provider,
                credits,
                allowed,
                remaining
            ),
            UsageEvent::QuotaReset {
                provider,
                cause,
                remaining,
                reset_at,
                ..
            } => log::info!(
                "[telemetry] quota_reset provider={} cause={} remaining={} reset_at={}",
                provider,
                cause,
                remaining,
                reset_at.to_rfc3339()
            ),
            UsageEvent::ProviderDeactivation { provider, .. } => {
                log::warn!("[telemetry] provider_deactivation provider={}", provider)
            }
        }
        self.events.push(event);
    }
}
