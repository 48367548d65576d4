//! Quota accounting module
//!
//! Per-provider credit ceilings with calendar reset windows.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │ trait QuotaStore                                        │
//! │   - initialize()      (insert if absent)                │
//! │   - get_remaining()   (lazy rollover, then read)        │
//! │   - try_consume()     (one atomic UPDATE ... RETURNING) │
//! │   - reset()           (provider or all)                 │
//! └─────────────────────────────────────────────────────────┘
//!          │
//!     ┌────┴─────────────┐
//!     ▼                  ▼
//! ┌──────────────┐  ┌──────────────┐
//! │ SQLite       │  │ Memory       │
//! │ (shared by   │  │ (single      │
//! │  processes)  │  │  process)    │
//! └──────────────┘  └──────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use quotagate_core::services::quota::{QuotaStore, QuotaWindow, SqliteQuotaStore};
//!
//! let store = SqliteQuotaStore::new(db.pool.clone());
//! store.initialize("google", 100, QuotaWindow::Day).await?;
//!
//! let outcome = store.try_consume("google", 1).await?;
//! if !outcome.allowed {
//!     // provider exhausted for this window
//! }
//! ```

pub mod clock;
pub mod store;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use store::{MemoryQuotaStore, QuotaStore, SqliteQuotaStore, StoredQuotaRecord};
pub use types::{Capability, ConsumeOutcome, QuotaRecord, QuotaWindow, ResetTarget};
