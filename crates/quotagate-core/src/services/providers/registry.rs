//! Provider Registry
//!
//! Static, capability-tagged list of providers built once at startup from
//! configuration. Candidates for a capability come back in ascending
//! priority; equal priorities keep configuration order.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::adapter::ProviderAdapter;
use super::brave::BraveAdapter;
use super::cost::CostRule;
use super::google::GoogleCseAdapter;
use super::scrapingant::ScrapingAntAdapter;
use super::serper::SerperAdapter;
use super::webscraping_ai::WebScrapingAiAdapter;
use crate::config::ProviderConfig;
use crate::error::{Error, Result};
use crate::services::quota::{Capability, QuotaWindow};

/// Compiled adapter implementations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdapterKind {
    GoogleCse,
    Brave,
    Serper,
    WebscrapingAi,
    Scrapingant,
}

impl AdapterKind {
    pub fn capability(&self) -> Capability {
        match self {
            AdapterKind::GoogleCse | AdapterKind::Brave | AdapterKind::Serper => Capability::Search,
            AdapterKind::WebscrapingAi | AdapterKind::Scrapingant => Capability::Scrape,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AdapterKind::GoogleCse => "google_cse",
            AdapterKind::Brave => "brave",
            AdapterKind::Serper => "serper",
            AdapterKind::WebscrapingAi => "webscraping_ai",
            AdapterKind::Scrapingant => "scrapingant",
        }
    }
}

impl std::fmt::Display for AdapterKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Static description of one provider
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderSpec {
    pub name: String,
    pub kind: AdapterKind,
    pub capability: Capability,
    pub priority: u32,
    pub limit: i64,
    pub window: QuotaWindow,
    pub cost: CostRule,
}

impl ProviderSpec {
    pub fn from_config(config: &ProviderConfig) -> Self {
        Self {
            name: config.name.clone(),
            kind: config.kind,
            capability: config.capability,
            priority: config.priority,
            limit: config.limit,
            window: config.window,
            cost: config.cost,
        }
    }
}

/// A provider spec paired with its adapter
#[derive(Clone)]
pub struct RegisteredProvider {
    pub spec: ProviderSpec,
    pub adapter: Arc<dyn ProviderAdapter>,
}

impl std::fmt::Debug for RegisteredProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredProvider")
            .field("spec", &self.spec)
            .finish_non_exhaustive()
    }
}

/// Ordered set of providers
#[derive(Debug, Default, Clone)]
pub struct ProviderRegistry {
    providers: Vec<RegisteredProvider>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a provider, rejecting duplicate names and capability mismatches
    pub fn register(&mut self, spec: ProviderSpec, adapter: Arc<dyn ProviderAdapter>) -> Result<()> {
        if spec.name.trim().is_empty() {
            return Err(Error::config("provider name must not be empty"));
        }
        if self.get(&spec.name).is_some() {
            return Err(Error::config(format!("duplicate provider name: {}", spec.name)));
        }
        if spec.capability != adapter.capability() {
            return Err(Error::config(format!(
                "provider {} is configured for {} but its adapter serves {}",
                spec.name,
                spec.capability,
                adapter.capability()
            )));
        }
        if spec.limit < 0 {
            return Err(Error::config(format!("provider {} has a negative limit", spec.name)));
        }
        if !spec.cost.is_valid() {
            return Err(Error::config(format!("provider {} has a negative cost", spec.name)));
        }

        log::debug!(
            "[registry] registered {} ({}, {}, priority {})",
            spec.name,
            spec.kind,
            spec.capability,
            spec.priority
        );
        self.providers.push(RegisteredProvider { spec, adapter });
        Ok(())
    }

    /// Build the registry from provider configs, reading credentials from the
    /// process environment.
    ///
    /// `strict` makes a missing credential a startup error; otherwise the
    /// provider is skipped with a warning.
    pub fn from_config(
        providers: &[ProviderConfig],
        client: &reqwest::Client,
        strict: bool,
    ) -> Result<Self> {
        Self::from_config_with(providers, client, strict, |var| std::env::var(var).ok())
    }

    /// Same as [`ProviderRegistry::from_config`] with an injectable lookup
    pub fn from_config_with<F>(
        providers: &[ProviderConfig],
        client: &reqwest::Client,
        strict: bool,
        lookup: F,
    ) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut registry = Self::new();

        for config in providers {
            let adapter = match build_adapter(config, client, &lookup) {
                Ok(adapter) => adapter,
                Err(err) if !strict => {
                    log::warn!("[registry] skipping provider {}: {}", config.name, err);
                    continue;
                }
                Err(err) => return Err(err),
            };
            registry.register(ProviderSpec::from_config(config), adapter)?;
        }

        log::info!(
            "[registry] {} provider(s) registered: {}",
            registry.len(),
            registry.names().join(", ")
        );
        Ok(registry)
    }

    pub fn get(&self, name: &str) -> Option<&RegisteredProvider> {
        self.providers.iter().find(|p| p.spec.name == name)
    }

    /// Providers serving `capability`, highest priority first
    pub fn candidates(&self, capability: Capability) -> Vec<&RegisteredProvider> {
        let mut candidates: Vec<&RegisteredProvider> = self
            .providers
            .iter()
            .filter(|p| p.spec.capability == capability)
            .collect();
        // stable sort keeps config order for equal priorities
        candidates.sort_by_key(|p| p.spec.priority);
        candidates
    }

    /// Every provider, search first, each capability in priority order
    pub fn all(&self) -> Vec<&RegisteredProvider> {
        let mut all = self.candidates(Capability::Search);
        all.extend(self.candidates(Capability::Scrape));
        all
    }

    pub fn names(&self) -> Vec<String> {
        self.all().into_iter().map(|p| p.spec.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

fn require_env<F>(lookup: &F, provider: &str, var: &str) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(Error::config(format!(
            "missing credential for provider {}: environment variable {} is not set",
            provider, var
        ))),
    }
}

fn build_adapter<F>(
    config: &ProviderConfig,
    client: &reqwest::Client,
    lookup: &F,
) -> Result<Arc<dyn ProviderAdapter>>
where
    F: Fn(&str) -> Option<String>,
{
    let key = require_env(lookup, &config.name, &config.credential_env)?;
    let client = client.clone();
    let name = config.name.clone();

    let adapter: Arc<dyn ProviderAdapter> = match config.kind {
        AdapterKind::GoogleCse => {
            let engine_var = config.engine_id_env.as_deref().unwrap_or("GOOGLE_CSE_ID");
            let engine_id = require_env(lookup, &config.name, engine_var)?;
            let mut adapter = GoogleCseAdapter::new(name, client, key, engine_id);
            if let Some(url) = &config.base_url {
                adapter = adapter.with_base_url(url.clone());
            }
            Arc::new(adapter)
        }
        AdapterKind::Brave => {
            let mut adapter = BraveAdapter::new(name, client, key);
            if let Some(url) = &config.base_url {
                adapter = adapter.with_base_url(url.clone());
            }
            Arc::new(adapter)
        }
        AdapterKind::Serper => {
            let mut adapter = SerperAdapter::new(name, client, key);
            if let Some(url) = &config.base_url {
                adapter = adapter.with_base_url(url.clone());
            }
            Arc::new(adapter)
        }
        AdapterKind::WebscrapingAi => {
            let mut adapter = WebScrapingAiAdapter::new(name, client, key);
            if let Some(url) = &config.base_url {
                adapter = adapter.with_base_url(url.clone());
            }
            Arc::new(adapter)
        }
        AdapterKind::Scrapingant => {
            let mut adapter = ScrapingAntAdapter::new(name, client, key);
            if let Some(url) = &config.base_url {
                adapter = adapter.with_base_url(url.clone());
            }
            Arc::new(adapter)
        }
    };

    Ok(adapter)
}
