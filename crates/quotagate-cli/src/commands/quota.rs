//! Quota commands
//!
//! Reads and resets the same database the gateway debits, so counts shown
//! here include usage from every running server.

use anyhow::{bail, Result};
use clap::Subcommand;
use serde::Serialize;
use tabled::Tabled;

use quotagate_core::{
    ProviderQuotaStatus, ProviderSpec, QuotaStore, ResetTarget, SqliteQuotaStore,
};

use crate::output::{print_json, print_output, print_success, OutputFormat};
use super::Context;

#[derive(Subcommand)]
pub enum QuotaAction {
    /// Show usage for every configured provider
    Status,

    /// Restore providers to their full limit
    Reset {
        /// Provider name, or "all"
        #[arg(default_value = "all")]
        provider: String,
    },
}

/// Quota row for table display
#[derive(Debug, Serialize, Tabled)]
pub struct QuotaRow {
    #[tabled(rename = "Provider")]
    pub provider: String,
    #[tabled(rename = "Capability")]
    pub capability: String,
    #[tabled(rename = "Used")]
    pub used: i64,
    #[tabled(rename = "Limit")]
    pub limit: i64,
    #[tabled(rename = "Remaining")]
    pub remaining: i64,
    #[tabled(rename = "Usage")]
    pub utilization: String,
    #[tabled(rename = "Resets")]
    pub reset_at: String,
    #[tabled(rename = "Status")]
    pub status: String,
}

impl From<&ProviderQuotaStatus> for QuotaRow {
    fn from(s: &ProviderQuotaStatus) -> Self {
        Self {
            provider: s.provider.clone(),
            capability: s.capability.to_string(),
            used: s.used,
            limit: s.limit,
            remaining: s.remaining,
            utilization: format!("{:.1}%", s.utilization_pct),
            reset_at: s.reset_at.format("%Y-%m-%d %H:%M UTC").to_string(),
            status: if s.active { "active" } else { "exhausted" }.to_string(),
        }
    }
}

pub async fn execute(ctx: &Context, action: QuotaAction) -> Result<()> {
    match action {
        QuotaAction::Status => show_status(ctx).await,
        QuotaAction::Reset { provider } => reset(ctx, &provider).await,
    }
}

async fn initialized_store(ctx: &Context) -> Result<SqliteQuotaStore> {
    let store = SqliteQuotaStore::new(ctx.db.pool.clone());
    for provider in &ctx.config.providers {
        store
            .initialize(&provider.name, provider.limit, provider.window)
            .await?;
    }
    Ok(store)
}

async fn collect_status(ctx: &Context, store: &SqliteQuotaStore) -> Result<Vec<ProviderQuotaStatus>> {
    let mut statuses = Vec::with_capacity(ctx.config.providers.len());
    for provider in &ctx.config.providers {
        let record = store.record(&provider.name).await?;
        statuses.push(ProviderQuotaStatus::new(&ProviderSpec::from_config(provider), &record));
    }
    statuses.sort_by(|a, b| {
        a.capability
            .to_string()
            .cmp(&b.capability.to_string())
            .then(a.priority.cmp(&b.priority))
    });
    Ok(statuses)
}

async fn show_status(ctx: &Context) -> Result<()> {
    let store = initialized_store(ctx).await?;
    let statuses = collect_status(ctx, &store).await?;

    match ctx.format {
        OutputFormat::Json => print_json(&statuses),
        OutputFormat::Table => {
            let rows: Vec<QuotaRow> = statuses.iter().map(QuotaRow::from).collect();
            print_output(&rows, ctx.format)
        }
    }
}

async fn reset(ctx: &Context, provider: &str) -> Result<()> {
    let target = ResetTarget::parse(provider);
    if let ResetTarget::Provider(name) = &target {
        if !ctx.config.providers.iter().any(|p| &p.name == name) {
            bail!("Unknown provider: {}", name);
        }
    }

    let store = initialized_store(ctx).await?;
    let records = store.reset(&target).await?;

    match ctx.format {
        OutputFormat::Json => print_json(&records),
        OutputFormat::Table => {
            print_success(
                &format!("Reset {} provider(s) ({})", records.len(), target),
                ctx.quiet,
            );
            Ok(())
        }
    }
}
