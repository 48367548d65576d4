//! Credit cost rules
//!
//! A provider charges either a flat number of credits per call or, for
//! scrape providers, an amount looked up from the rendering/proxy flags.

use serde::{Deserialize, Serialize};

use super::adapter::AdapterRequest;

/// Scrape credit table keyed by `(render_js, premium_proxy)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeCostTable {
    pub plain: i64,
    pub render_js: i64,
    pub premium_proxy: i64,
    pub render_js_premium_proxy: i64,
}

impl Default for ScrapeCostTable {
    fn default() -> Self {
        Self {
            plain: 1,
            render_js: 10,
            premium_proxy: 25,
            render_js_premium_proxy: 125,
        }
    }
}

impl ScrapeCostTable {
    pub fn lookup(&self, render_js: bool, premium_proxy: bool) -> i64 {
        match (render_js, premium_proxy) {
            (false, false) => self.plain,
            (true, false) => self.render_js,
            (false, true) => self.premium_proxy,
            (true, true) => self.render_js_premium_proxy,
        }
    }
}

/// How many credits one call costs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostRule {
    /// Same cost for every call
    Flat(i64),
    /// Cost depends on scrape flags
    ScrapeTable(ScrapeCostTable),
}

impl Default for CostRule {
    fn default() -> Self {
        CostRule::Flat(1)
    }
}

impl CostRule {
    /// Credits to debit before invoking the provider for `request`
    pub fn credits_for(&self, request: &AdapterRequest) -> i64 {
        match (self, request) {
            (CostRule::Flat(credits), _) => *credits,
            (
                CostRule::ScrapeTable(table),
                AdapterRequest::Scrape {
                    render_js,
                    premium_proxy,
                    ..
                },
            ) => table.lookup(*render_js, *premium_proxy),
            (CostRule::ScrapeTable(table), AdapterRequest::Search { .. }) => table.plain,
        }
    }

    pub fn is_valid(&self) -> bool {
        match self {
            CostRule::Flat(credits) => *credits >= 0,
            CostRule::ScrapeTable(t) => {
                t.plain >= 0 && t.render_js >= 0 && t.premium_proxy >= 0 && t.render_js_premium_proxy >= 0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scrape(render_js: bool, premium_proxy: bool) -> AdapterRequest {
        AdapterRequest::Scrape {
            url: "https://example.com".to_string(),
            render_js,
            premium_proxy,
        }
    }

    #[test]
    fn test_default_scrape_table() {
        let rule = CostRule::ScrapeTable(ScrapeCostTable::default());
        assert_eq!(rule.credits_for(&scrape(false, false)), 1);
        assert_eq!(rule.credits_for(&scrape(true, false)), 10);
        assert_eq!(rule.credits_for(&scrape(false, true)), 25);
        assert_eq!(rule.credits_for(&scrape(true, true)), 125);
    }

    #[test]
    fn test_flat_rule_ignores_flags() {
        let rule = CostRule::Flat(2);
        assert_eq!(rule.credits_for(&scrape(true, true)), 2);
        let search = AdapterRequest::Search {
            query: "q".to_string(),
            max_results: 10,
        };
        assert_eq!(rule.credits_for(&search), 2);
    }

    #[test]
    fn test_rule_deserializes_from_config() {
        let flat: CostRule = serde_json::from_str(r#"{"flat": 1}"#).unwrap();
        assert_eq!(flat, CostRule::Flat(1));

        let table: CostRule = serde_json::from_str(
            r#"{"scrape_table": {"plain": 1, "render_js": 5, "premium_proxy": 10, "render_js_premium_proxy": 25}}"#,
        )
        .unwrap();
        assert_eq!(table.credits_for(&scrape(true, false)), 5);
    }

    #[test]
    fn test_negative_cost_is_invalid() {
        assert!(!CostRule::Flat(-1).is_valid());
        assert!(CostRule::Flat(0).is_valid());
    }
}
