/// Cache directory: active zonal caches grouped by country.
///
/// When several active caches share a country the one with the smallest
/// address wins, then the lowest port, so selection never depends on the
/// order the store happened to return documents in.
use edge_proto::records::CacheNode;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::zones::ZoneFallbackMap;

/// Endpoint chosen for a requesting country.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheSelection {
    #[serde(rename = "ip_cache")]
    pub address: String,
    #[serde(rename = "puerto")]
    pub port: u16,
    /// Country the request came in with.
    #[serde(rename = "pais_origen")]
    pub requested_country: String,
    /// Country whose cache was picked, after fallback substitution.
    #[serde(rename = "pais_cache")]
    pub resolved_country: String,
}

#[derive(Debug, Default)]
pub struct CacheDirectory {
    by_country: BTreeMap<String, Vec<CacheNode>>,
}

impl CacheDirectory {
    /// Index the active nodes; inactive ones are discarded.
    pub fn new(nodes: impl IntoIterator<Item = CacheNode>) -> Self {
        let mut by_country: BTreeMap<String, Vec<CacheNode>> = BTreeMap::new();
        for mut node in nodes.into_iter().filter(|n| n.active) {
            node.country = node.country.to_ascii_uppercase();
            by_country.entry(node.country.clone()).or_default().push(node);
        }
        for nodes in by_country.values_mut() {
            nodes.sort_by(|a, b| {
                (a.address.as_str(), a.port_or_default())
                    .cmp(&(b.address.as_str(), b.port_or_default()))
            });
        }
        Self { by_country }
    }

    /// Preferred active node located in `country` (no substitution).
    pub fn first_active(&self, country: &str) -> Option<&CacheNode> {
        self.by_country.get(country).and_then(|nodes| nodes.first())
    }

    /// Pick the cache serving `country`, substituting through `zones` once.
    pub fn select(&self, country: &str, zones: &ZoneFallbackMap) -> Option<CacheSelection> {
        let requested = country.trim().to_ascii_uppercase();
        let resolved = zones.resolve(&requested);

        match self.first_active(resolved) {
            Some(node) => {
                let selection = CacheSelection {
                    address: node.address.clone(),
                    port: node.port_or_default(),
                    requested_country: requested.clone(),
                    resolved_country: resolved.to_string(),
                };
                tracing::info!(
                    country = %requested,
                    resolved = %resolved,
                    endpoint = %format!("{}:{}", selection.address, selection.port),
                    "Zonal cache selected"
                );
                Some(selection)
            }
            None => {
                tracing::info!(
                    country = %requested,
                    resolved = %resolved,
                    "No active zonal cache"
                );
                None
            }
        }
    }

    pub fn active_count(&self) -> usize {
        self.by_country.values().map(Vec::len).sum()
    }

    pub fn countries(&self) -> impl Iterator<Item = &str> {
        self.by_country.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(country: &str, address: &str, port: Option<u16>, active: bool) -> CacheNode {
        CacheNode {
            country: country.into(),
            address: address.into(),
            port,
            active,
        }
    }

    fn mx_to_us() -> ZoneFallbackMap {
        ZoneFallbackMap::from_pairs([("MX", "US")])
    }

    #[test]
    fn test_fallback_substitution() {
        let dir = CacheDirectory::new([node("US", "1.2.3.4", Some(80), true)]);
        let selected = dir.select("MX", &mx_to_us()).unwrap();
        assert_eq!(
            selected,
            CacheSelection {
                address: "1.2.3.4".into(),
                port: 80,
                requested_country: "MX".into(),
                resolved_country: "US".into(),
            }
        );
    }

    #[test]
    fn test_direct_hit() {
        let dir = CacheDirectory::new([node("US", "1.2.3.4", Some(80), true)]);
        let selected = dir.select("US", &mx_to_us()).unwrap();
        assert_eq!(selected.address, "1.2.3.4");
        assert_eq!(selected.resolved_country, "US");
        assert_eq!(selected.requested_country, "US");
    }

    #[test]
    fn test_not_found_without_fallback_or_cache() {
        let dir = CacheDirectory::new([node("US", "1.2.3.4", Some(80), true)]);
        assert_eq!(dir.select("ZZ", &mx_to_us()), None);
    }

    #[test]
    fn test_fallback_target_without_cache() {
        let dir = CacheDirectory::new([node("BR", "5.6.7.8", None, true)]);
        assert_eq!(dir.select("MX", &mx_to_us()), None);
    }

    #[test]
    fn test_inactive_nodes_ignored() {
        let dir = CacheDirectory::new([
            node("US", "1.1.1.1", Some(80), false),
            node("US", "9.9.9.9", Some(8080), true),
        ]);
        assert_eq!(dir.active_count(), 1);
        assert_eq!(dir.select("US", &mx_to_us()).unwrap().address, "9.9.9.9");

        let only_inactive = CacheDirectory::new([node("US", "1.1.1.1", Some(80), false)]);
        assert_eq!(only_inactive.select("US", &mx_to_us()), None);
    }

    #[test]
    fn test_tie_break_smallest_address_then_port() {
        let dir = CacheDirectory::new([
            node("US", "10.0.0.9", Some(80), true),
            node("US", "10.0.0.1", Some(9090), true),
            node("US", "10.0.0.1", None, true),
        ]);
        let selected = dir.select("US", &mx_to_us()).unwrap();
        assert_eq!(selected.address, "10.0.0.1");
        assert_eq!(selected.port, 80);
    }

    #[test]
    fn test_default_port() {
        let dir = CacheDirectory::new([node("US", "1.2.3.4", None, true)]);
        assert_eq!(dir.select("US", &mx_to_us()).unwrap().port, 80);
    }

    #[test]
    fn test_country_case_normalised() {
        let dir = CacheDirectory::new([node("us", "1.2.3.4", None, true)]);
        assert_eq!(dir.countries().collect::<Vec<_>>(), vec!["US"]);
        let selected = dir.select("mx", &mx_to_us()).unwrap();
        assert_eq!(selected.requested_country, "MX");
        assert_eq!(selected.resolved_country, "US");
    }

    #[test]
    fn test_selection_is_stable() {
        let dir = CacheDirectory::new([
            node("JP", "3.3.3.3", None, true),
            node("JP", "2.2.2.2", None, true),
        ]);
        let zones = ZoneFallbackMap::builtin();
        let first = dir.select("KR", &zones);
        for _ in 0..5 {
            assert_eq!(dir.select("KR", &zones), first);
        }
        assert_eq!(first.unwrap().address, "2.2.2.2");
    }
}
