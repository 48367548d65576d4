//! Services module

pub mod dispatch;
pub mod providers;
pub mod quota;
pub mod telemetry;

pub use dispatch::{
    Attempt, AttemptOutcome, DispatchError, DispatchOutcome, DispatchRequest, Dispatcher,
    ProviderQuotaStatus, ProviderSelection,
};
pub use providers::{
    AdapterError, AdapterKind, AdapterRequest, CostRule, NormalizedResult, ProviderAdapter,
    ProviderRegistry, ProviderSpec, SearchHit,
};
pub use quota::{
    Capability, MemoryQuotaStore, QuotaRecord, QuotaStore, QuotaWindow, ResetTarget,
    SqliteQuotaStore,
};
pub use telemetry::{EventRecorder, ResetCause, TelemetrySink, UsageEvent};
