//! External provider adapters
//!
//! One adapter per search/scrape API, all behind [`ProviderAdapter`], plus the
//! registry that orders them per capability and the cost rules that price
//! each call.

pub mod adapter;
pub mod brave;
pub mod cost;
pub mod google;
pub mod http;
pub mod registry;
pub mod scrapingant;
pub mod serper;
pub mod webscraping_ai;

pub use adapter::{AdapterError, AdapterRequest, NormalizedResult, ProviderAdapter, SearchHit};
pub use brave::BraveAdapter;
pub use cost::{CostRule, ScrapeCostTable};
pub use google::GoogleCseAdapter;
pub use http::build_client;
pub use registry::{AdapterKind, ProviderRegistry, ProviderSpec, RegisteredProvider};
pub use scrapingant::ScrapingAntAdapter;
pub use serper::SerperAdapter;
pub use webscraping_ai::WebScrapingAiAdapter;
