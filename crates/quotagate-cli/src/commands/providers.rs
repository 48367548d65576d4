//! Provider listing

use anyhow::Result;
use serde::Serialize;
use tabled::Tabled;

use quotagate_core::{CostRule, ProviderConfig};

use crate::output::print_output;
use super::Context;

/// Provider row for table display
#[derive(Debug, Serialize, Tabled)]
pub struct ProviderRow {
    #[tabled(rename = "Name")]
    pub name: String,
    #[tabled(rename = "Kind")]
    pub kind: String,
    #[tabled(rename = "Capability")]
    pub capability: String,
    #[tabled(rename = "Priority")]
    pub priority: u32,
    #[tabled(rename = "Limit")]
    pub limit: String,
    #[tabled(rename = "Cost")]
    pub cost: String,
    #[tabled(rename = "Credential")]
    pub credential_env: String,
    #[tabled(rename = "Set")]
    pub credential_set: bool,
}

fn describe_cost(cost: &CostRule) -> String {
    match cost {
        CostRule::Flat(credits) => format!("{} / call", credits),
        CostRule::ScrapeTable(t) => format!(
            "{}/{}/{}/{}",
            t.plain, t.render_js, t.premium_proxy, t.render_js_premium_proxy
        ),
    }
}

fn credential_present(env: &str) -> bool {
    std::env::var(env).map(|v| !v.trim().is_empty()).unwrap_or(false)
}

impl From<&ProviderConfig> for ProviderRow {
    fn from(p: &ProviderConfig) -> Self {
        let mut credential_set = credential_present(&p.credential_env);
        if let Some(engine_env) = &p.engine_id_env {
            credential_set &= credential_present(engine_env);
        }

        Self {
            name: p.name.clone(),
            kind: p.kind.to_string(),
            capability: p.capability.to_string(),
            priority: p.priority,
            limit: format!("{} / {}", p.limit, p.window),
            cost: describe_cost(&p.cost),
            credential_env: p.credential_env.clone(),
            credential_set,
        }
    }
}

pub async fn execute(ctx: &Context) -> Result<()> {
    let mut rows: Vec<ProviderRow> = ctx.config.providers.iter().map(ProviderRow::from).collect();
    rows.sort_by(|a, b| a.capability.cmp(&b.capability).then(a.priority.cmp(&b.priority)));
    print_output(&rows, ctx.format)
}

#[cfg(test)]
mod tests {
    use super::*;
    use quotagate_core::config::default_providers;

    #[test]
    fn test_describe_cost() {
        assert_eq!(describe_cost(&CostRule::Flat(1)), "1 / call");
        assert_eq!(
            describe_cost(&CostRule::ScrapeTable(Default::default())),
            "1/10/25/125"
        );
    }

    #[test]
    fn test_row_never_carries_secret_value() {
        let providers = default_providers();
        let brave = providers.iter().find(|p| p.name == "brave").unwrap();
        let row = ProviderRow::from(brave);
        assert_eq!(row.credential_env, "BRAVE_API");
        assert_eq!(row.limit, "2000 / month");
    }
}
