//! CLI commands module

pub mod providers;
pub mod quota;
pub mod serve;

use crate::output::OutputFormat;
use quotagate_core::{Database, GatewayConfig};

/// Shared context for all commands
pub struct Context {
    pub db: Database,
    pub config: GatewayConfig,
    pub format: OutputFormat,
    pub quiet: bool,
}
