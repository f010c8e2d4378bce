use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Streaming providers as stored. Older rows hold a flat list, rows
/// refreshed from TMDB hold a per-country map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StreamingProviders {
    Flat(Vec<String>),
    ByCountry(BTreeMap<String, Vec<String>>),
}

impl Default for StreamingProviders {
    fn default() -> Self {
        StreamingProviders::Flat(Vec::new())
    }
}

impl StreamingProviders {
    /// Unique provider names, sorted.
    pub fn flatten(&self) -> Vec<String> {
        let names: BTreeSet<&str> = match self {
            StreamingProviders::Flat(list) => list.iter().map(|s| s.trim()).collect(),
            StreamingProviders::ByCountry(map) => map
                .values()
                .flat_map(|list| list.iter().map(|s| s.trim()))
                .collect(),
        };
        names
            .into_iter()
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
            .collect()
    }
}
