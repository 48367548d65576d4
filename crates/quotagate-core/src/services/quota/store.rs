//! Quota storage layer
//!
//! Two implementations of [`QuotaStore`]:
//! - [`SqliteQuotaStore`]: durable, shared by every process that opens the
//!   same database file. Each mutation is one SQL statement.
//! - [`MemoryQuotaStore`]: process-local, for tests and throwaway runs.
//!
//! Window rollover is lazy: every access first checks whether `reset_at`
//! has passed and, if so, refills the record before doing anything else.
//! A store given a [`TelemetrySink`] reports each rollover as a
//! `quota_reset` event with cause `rollover`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};

use super::clock::{Clock, SystemClock};
use super::types::{ConsumeOutcome, QuotaRecord, QuotaWindow, ResetTarget};
use crate::error::{Error, Result};
use crate::services::telemetry::{ResetCause, TelemetrySink, UsageEvent};

// ============================================================================
// Store Trait
// ============================================================================

/// Atomic per-provider credit accounting
#[async_trait]
pub trait QuotaStore: Send + Sync {
    /// Create the record for `provider` with `remaining = limit`.
    ///
    /// No-op if the record already exists.
    async fn initialize(&self, provider: &str, limit: i64, window: QuotaWindow) -> Result<()>;

    /// Remaining credits after applying any pending rollover
    async fn get_remaining(&self, provider: &str) -> Result<i64>;

    /// Atomically debit `credits`.
    ///
    /// A debit larger than what is left drains the record to zero and is
    /// reported as `allowed = false`.
    async fn try_consume(&self, provider: &str, credits: i64) -> Result<ConsumeOutcome>;

    /// Refill to the configured limit and move `reset_at` to the next boundary
    async fn reset(&self, target: &ResetTarget) -> Result<Vec<QuotaRecord>>;

    /// Current record for one provider, rollover applied
    async fn record(&self, provider: &str) -> Result<QuotaRecord>;

    /// Current records for all providers, rollover applied
    async fn records(&self) -> Result<Vec<QuotaRecord>>;
}

fn report_rollover(telemetry: Option<&Arc<dyn TelemetrySink>>, record: &QuotaRecord, now: DateTime<Utc>) {
    if let Some(sink) = telemetry {
        sink.record(UsageEvent::QuotaReset {
            provider: record.provider.clone(),
            cause: ResetCause::Rollover,
            remaining: record.remaining,
            reset_at: record.reset_at,
            timestamp: now,
        });
    }
}

fn check_credits(credits: i64) -> Result<()> {
    if credits < 0 {
        return Err(Error::validation(format!(
            "credit cost must not be negative (got {})",
            credits
        )));
    }
    Ok(())
}

// ============================================================================
// Database Row Types
// ============================================================================

/// Database row representation of a quota record
///
/// This struct maps directly to the `quota_records` table schema.
#[derive(Debug, Clone, FromRow)]
pub struct StoredQuotaRecord {
    pub provider: String,
    pub limit_credits: i64,
    pub remaining: i64,
    /// "day" or "month"
    pub window_type: String,
    /// Unix epoch milliseconds
    pub reset_at_ms: i64,
}

impl StoredQuotaRecord {
    /// Convert database row to QuotaRecord
    pub fn to_quota_record(&self) -> Result<QuotaRecord> {
        let window = self
            .window_type
            .parse::<QuotaWindow>()
            .map_err(Error::Internal)?;

        let reset_at = DateTime::<Utc>::from_timestamp_millis(self.reset_at_ms).ok_or_else(|| {
            Error::internal(format!(
                "invalid reset timestamp {} for {}",
                self.reset_at_ms, self.provider
            ))
        })?;

        Ok(QuotaRecord {
            provider: self.provider.clone(),
            limit: self.limit_credits,
            remaining: self.remaining.max(0),
            window,
            reset_at,
        })
    }
}

const RECORD_COLUMNS: &str = "provider, limit_credits, remaining, window_type, reset_at_ms";

// ============================================================================
// SqliteQuotaStore
// ============================================================================

/// SQLite-backed quota store
///
/// Correctness across processes relies on SQLite serialising writers: the
/// consume path is a single `UPDATE ... RETURNING`, never a read followed by
/// a write.
pub struct SqliteQuotaStore {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
    telemetry: Option<Arc<dyn TelemetrySink>>,
}

impl SqliteQuotaStore {
    /// Create a new store with the given database pool
    pub fn new(pool: SqlitePool) -> Self {
        Self::with_clock(pool, Arc::new(SystemClock))
    }

    /// Create a store with an explicit time source
    pub fn with_clock(pool: SqlitePool, clock: Arc<dyn Clock>) -> Self {
        Self {
            pool,
            clock,
            telemetry: None,
        }
    }

    /// Report window rollovers to `sink`
    pub fn with_telemetry(mut self, sink: Arc<dyn TelemetrySink>) -> Self {
        self.telemetry = Some(sink);
        self
    }

    async fn fetch_row(&self, provider: &str) -> Result<StoredQuotaRecord> {
        let sql = format!("SELECT {} FROM quota_records WHERE provider = ?", RECORD_COLUMNS);
        sqlx::query_as::<_, StoredQuotaRecord>(&sql)
            .bind(provider)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::not_found(format!("no quota record for provider {}", provider)))
    }

    /// Refill the record if its window has elapsed.
    ///
    /// The UPDATE is conditional on `reset_at_ms` still being in the past, so
    /// concurrent callers roll a window over exactly once.
    async fn apply_rollover(&self, provider: &str) -> Result<QuotaRecord> {
        let record = self.fetch_row(provider).await?.to_quota_record()?;
        let now = self.clock.now();

        if !record.needs_rollover(now) {
            return Ok(record);
        }

        let next = record.window.next_reset_after(now);
        let sql = format!(
            r#"
            UPDATE quota_records
            SET remaining = limit_credits,
                reset_at_ms = MAX(reset_at_ms, ?),
                updated_at = CURRENT_TIMESTAMP
            WHERE provider = ? AND reset_at_ms <= ?
            RETURNING {}
            "#,
            RECORD_COLUMNS
        );

        let updated = sqlx::query_as::<_, StoredQuotaRecord>(&sql)
            .bind(next.timestamp_millis())
            .bind(provider)
            .bind(now.timestamp_millis())
            .fetch_optional(&self.pool)
            .await?;

        match updated {
            Some(row) => {
                let record = row.to_quota_record()?;
                log::info!(
                    "[quota:store] Window rolled over for {}: remaining={} next_reset={}",
                    provider,
                    record.remaining,
                    record.reset_at.to_rfc3339()
                );
                report_rollover(self.telemetry.as_ref(), &record, now);
                Ok(record)
            }
            // Another caller rolled it over between our read and update
            None => self.fetch_row(provider).await?.to_quota_record(),
        }
    }

    async fn reset_one(&self, provider: &str) -> Result<QuotaRecord> {
        let record = self.fetch_row(provider).await?.to_quota_record()?;
        let next = record.window.next_reset_after(self.clock.now());

        let sql = format!(
            r#"
            UPDATE quota_records
            SET remaining = limit_credits,
                reset_at_ms = MAX(reset_at_ms, ?),
                updated_at = CURRENT_TIMESTAMP
            WHERE provider = ?
            RETURNING {}
            "#,
            RECORD_COLUMNS
        );

        let row = sqlx::query_as::<_, StoredQuotaRecord>(&sql)
            .bind(next.timestamp_millis())
            .bind(provider)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::not_found(format!("no quota record for provider {}", provider)))?;

        row.to_quota_record()
    }
}

#[async_trait]
impl QuotaStore for SqliteQuotaStore {
    async fn initialize(&self, provider: &str, limit: i64, window: QuotaWindow) -> Result<()> {
        if limit < 0 {
            return Err(Error::config(format!(
                "quota limit for {} must not be negative",
                provider
            )));
        }

        let reset_at = window.next_reset_after(self.clock.now());
        let result = sqlx::query(
            r#"
            INSERT INTO quota_records (provider, limit_credits, remaining, window_type, reset_at_ms)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(provider) DO NOTHING
            "#,
        )
        .bind(provider)
        .bind(limit)
        .bind(limit)
        .bind(window.to_string())
        .bind(reset_at.timestamp_millis())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            log::info!(
                "[quota:store] Initialized {} with {} credits per {}",
                provider,
                limit,
                window
            );
        } else {
            log::debug!("[quota:store] {} already initialized", provider);
        }

        Ok(())
    }

    async fn get_remaining(&self, provider: &str) -> Result<i64> {
        Ok(self.apply_rollover(provider).await?.remaining)
    }

    async fn try_consume(&self, provider: &str, credits: i64) -> Result<ConsumeOutcome> {
        check_credits(credits)?;
        self.apply_rollover(provider).await?;

        // SET expressions all see the pre-update row, so `last_debit` is the
        // amount actually taken from the balance before the debit. The grant
        // succeeded iff the whole cost could be taken.
        let (remaining, debited): (i64, i64) = sqlx::query_as(
            r#"
            UPDATE quota_records
            SET remaining = MAX(remaining - ?, 0),
                last_debit = MIN(remaining, ?),
                updated_at = CURRENT_TIMESTAMP
            WHERE provider = ?
            RETURNING remaining, last_debit
            "#,
        )
        .bind(credits)
        .bind(credits)
        .bind(provider)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::not_found(format!("no quota record for provider {}", provider)))?;

        let outcome = ConsumeOutcome {
            allowed: debited == credits,
            remaining,
            previous: remaining + debited,
        };

        log::debug!(
            "[quota:store] consume {} x{}: allowed={} remaining={}",
            provider,
            credits,
            outcome.allowed,
            outcome.remaining
        );

        Ok(outcome)
    }

    async fn reset(&self, target: &ResetTarget) -> Result<Vec<QuotaRecord>> {
        let providers: Vec<String> = match target {
            ResetTarget::Provider(name) => vec![name.clone()],
            ResetTarget::All => sqlx::query_scalar("SELECT provider FROM quota_records ORDER BY provider")
                .fetch_all(&self.pool)
                .await?,
        };

        let mut records = Vec::with_capacity(providers.len());
        for provider in &providers {
            records.push(self.reset_one(provider).await?);
        }

        log::info!("[quota:store] Reset {} provider(s) ({})", records.len(), target);
        Ok(records)
    }

    async fn record(&self, provider: &str) -> Result<QuotaRecord> {
        self.apply_rollover(provider).await
    }

    async fn records(&self) -> Result<Vec<QuotaRecord>> {
        let providers: Vec<String> =
            sqlx::query_scalar("SELECT provider FROM quota_records ORDER BY provider")
                .fetch_all(&self.pool)
                .await?;

        let mut records = Vec::with_capacity(providers.len());
        for provider in &providers {
            records.push(self.apply_rollover(provider).await?);
        }
        Ok(records)
    }
}

// ============================================================================
// MemoryQuotaStore
// ============================================================================

/// Process-local quota store
///
/// Every operation runs under one mutex, so it is linearizable within the
/// process. Counts are lost on restart and invisible to other instances.
pub struct MemoryQuotaStore {
    records: Mutex<HashMap<String, QuotaRecord>>,
    clock: Arc<dyn Clock>,
    telemetry: Option<Arc<dyn TelemetrySink>>,
}

impl Default for MemoryQuotaStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryQuotaStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            clock,
            telemetry: None,
        }
    }

    /// Report window rollovers to `sink`
    pub fn with_telemetry(mut self, sink: Arc<dyn TelemetrySink>) -> Self {
        self.telemetry = Some(sink);
        self
    }

    /// Run `f` on the rolled-over record for `provider` while holding the lock
    fn with_record<T>(&self, provider: &str, f: impl FnOnce(&mut QuotaRecord) -> T) -> Result<T> {
        let now = self.clock.now();
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        let record = records
            .get_mut(provider)
            .ok_or_else(|| Error::not_found(format!("no quota record for provider {}", provider)))?;

        if record.needs_rollover(now) {
            record.remaining = record.limit;
            record.reset_at = record.reset_at.max(record.window.next_reset_after(now));
            log::info!("[quota:memory] Window rolled over for {}", provider);
            report_rollover(self.telemetry.as_ref(), record, now);
        }

        Ok(f(record))
    }
}

#[async_trait]
impl QuotaStore for MemoryQuotaStore {
    async fn initialize(&self, provider: &str, limit: i64, window: QuotaWindow) -> Result<()> {
        if limit < 0 {
            return Err(Error::config(format!(
                "quota limit for {} must not be negative",
                provider
            )));
        }
        let now = self.clock.now();
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        records
            .entry(provider.to_string())
            .or_insert_with(|| QuotaRecord::new(provider, limit, window, now));
        Ok(())
    }

    async fn get_remaining(&self, provider: &str) -> Result<i64> {
        self.with_record(provider, |r| r.remaining)
    }

    async fn try_consume(&self, provider: &str, credits: i64) -> Result<ConsumeOutcome> {
        check_credits(credits)?;
        self.with_record(provider, |r| {
            let previous = r.remaining;
            r.remaining = (previous - credits).max(0);
            ConsumeOutcome {
                allowed: previous >= credits,
                remaining: r.remaining,
                previous,
            }
        })
    }

    async fn reset(&self, target: &ResetTarget) -> Result<Vec<QuotaRecord>> {
        let now = self.clock.now();
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());

        let mut names: Vec<String> = match target {
            ResetTarget::Provider(name) => {
                if !records.contains_key(name) {
                    return Err(Error::not_found(format!("no quota record for provider {}", name)));
                }
                vec![name.clone()]
            }
            ResetTarget::All => records.keys().cloned().collect(),
        };
        names.sort();

        let mut out = Vec::with_capacity(names.len());
        for name in names {
            if let Some(record) = records.get_mut(&name) {
                record.remaining = record.limit;
                record.reset_at = record.reset_at.max(record.window.next_reset_after(now));
                out.push(record.clone());
            }
        }
        Ok(out)
    }

    async fn record(&self, provider: &str) -> Result<QuotaRecord> {
        self.with_record(provider, |r| r.clone())
    }

    async fn records(&self) -> Result<Vec<QuotaRecord>> {
        let mut names: Vec<String> = {
            let records = self.records.lock().unwrap_or_else(|e| e.into_inner());
            records.keys().cloned().collect()
        };
        names.sort();

        let mut out = Vec::with_capacity(names.len());
        for name in names {
            out.push(self.with_record(&name, |r| r.clone())?);
        }
        Ok(out)
    }
}

// ============================================================================
// Tests
// ============================================================================
