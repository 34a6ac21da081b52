//! URL pattern expansion.
//!
//! A crawl source describes its pages as patterns over a base URL:
//! numeric ranges (`/page/{number}`) or explicit value lists
//! (`/category/{value}`). Expansion is pure string substitution.

use serde::{Deserialize, Serialize};

/// One URL pattern in a crawl source definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UrlPattern {
    /// Substitute `{number}` over an inclusive numeric range.
    NumericRange {
        #[serde(default = "default_start")]
        start: u32,
        end: u32,
        #[serde(default = "default_step")]
        step: u32,
        /// Template with `{base_url}` and `{number}` placeholders.
        template: String,
    },
    /// Substitute `{value}` for each listed value.
    List {
        values: Vec<String>,
        /// Template with `{base_url}` and `{value}` placeholders.
        template: String,
    },
}

fn default_start() -> u32 {
    1
}
fn default_step() -> u32 {
    1
}

impl UrlPattern {
    /// Expand this pattern against a base URL.
    pub fn expand(&self, base_url: &str) -> Vec<String> {
        let base = base_url.trim_end_matches('/');
        match self {
            Self::NumericRange {
                start,
                end,
                step,
                template,
            } => {
                let step = (*step).max(1);
                (*start..=*end)
                    .step_by(step as usize)
                    .map(|n| {
                        template
                            .replace("{base_url}", base)
                            .replace("{number}", &n.to_string())
                    })
                    .collect()
            }
            Self::List { values, template } => values
                .iter()
                .map(|v| {
                    template
                        .replace("{base_url}", base)
                        .replace("{value}", v)
                })
                .collect(),
        }
    }
}

/// Expand all patterns in order, deduplicating while preserving order.
pub fn expand_all(patterns: &[UrlPattern], base_url: &str) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut urls = Vec::new();
    for pattern in patterns {
        for url in pattern.expand(base_url) {
            if seen.insert(url.clone()) {
                urls.push(url);
            }
        }
    }
    urls
}
