/// Geo-routing service: the read-only operations the HTTP boundary calls.
///
/// IP and cache lookups are answered from the current snapshot; domain
/// lookups go to the store. Nothing here keeps per-call state.
use edge_proto::addr::parse_dotted_quad;
use serde::Serialize;
use std::sync::Arc;

use crate::caches::CacheSelection;
use crate::error::{Result, RoutingError};
use crate::origin::{OriginConfig, OriginResolver};
use crate::ranges::RangeListing;
use crate::snapshot::SnapshotCell;
use crate::zones::ZoneFallbackMap;

/// Inputs of a combined routing request. At least one must be set.
#[derive(Debug, Clone, Default)]
pub struct RouteQuery<'a> {
    pub ip: Option<&'a str>,
    /// Known country; skips IP resolution when set.
    pub country: Option<&'a str>,
    pub domain: Option<&'a str>,
}

/// Everything the edge needs to serve one client.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteDecision {
    #[serde(rename = "pais")]
    pub country: Option<String>,
    pub cache: Option<CacheSelection>,
    #[serde(rename = "configuracion")]
    pub origin: Option<OriginConfig>,
}

#[derive(Clone)]
pub struct GeoRoutingService {
    snapshot: Arc<SnapshotCell>,
    zones: Arc<ZoneFallbackMap>,
    origins: OriginResolver,
}

impl GeoRoutingService {
    pub fn new(snapshot: Arc<SnapshotCell>, zones: ZoneFallbackMap, origins: OriginResolver) -> Self {
        Self {
            snapshot,
            zones: Arc::new(zones),
            origins,
        }
    }

    /// Country owning `ip`. The address is validated before the snapshot is consulted.
    pub fn route_by_ip(&self, ip: &str) -> Result<Option<String>> {
        let ip = ip.trim();
        if ip.is_empty() {
            return Err(RoutingError::InvalidInput("ip is required".into()));
        }
        let n = parse_dotted_quad(ip)?;
        let snapshot = self.snapshot.require()?;
        let country = snapshot.ranges.resolve_country(n).map(str::to_string);
        tracing::debug!(ip, country = ?country, "IP resolved");
        Ok(country)
    }

    /// Nearest active cache for `country`, substituting through the fallback table.
    pub fn select_nearest_cache(&self, country: &str) -> Result<Option<CacheSelection>> {
        if country.trim().is_empty() {
            return Err(RoutingError::InvalidInput("country is required".into()));
        }
        let snapshot = self.snapshot.require()?;
        Ok(snapshot.caches.select(country, &self.zones))
    }

    pub async fn route_by_domain(&self, domain: &str) -> Result<Option<OriginConfig>> {
        self.origins.resolve_origin(domain).await
    }

    pub fn list_ranges(&self) -> Result<Vec<RangeListing>> {
        Ok(self.snapshot.require()?.ranges.listing())
    }

    /// Country, cache, and origin for one client in a single call.
    ///
    /// Cache selection depends on the country, so those run in sequence;
    /// the origin lookup is independent and runs alongside them.
    pub async fn route_request(&self, query: RouteQuery<'_>) -> Result<RouteDecision> {
        if query.ip.is_none() && query.country.is_none() && query.domain.is_none() {
            return Err(RoutingError::InvalidInput(
                "one of ip, country or domain is required".into(),
            ));
        }

        let geo = async {
            let country = match (query.country, query.ip) {
                (Some(country), _) => Some(country.trim().to_ascii_uppercase()),
                (None, Some(ip)) => self.route_by_ip(ip)?,
                (None, None) => None,
            };
            let cache = match &country {
                Some(country) => self.select_nearest_cache(country)?,
                None => None,
            };
            Ok::<_, RoutingError>((country, cache))
        };
        let origin = async {
            match query.domain {
                Some(domain) => self.route_by_domain(domain).await,
                None => Ok(None),
            }
        };

        let (geo, origin) = tokio::join!(geo, origin);
        let (country, cache) = geo?;
        Ok(RouteDecision {
            country,
            cache,
            origin: origin?,
        })
    }
}
