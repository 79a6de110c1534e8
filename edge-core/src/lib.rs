//! Geo-routing core of the edge control plane.
//!
//! Resolves a client IPv4 address to a country, a country to the nearest
//! active zonal cache, and a registered domain to its upstream origin.
//! Range and cache data are served from an in-memory [`snapshot`] that is
//! reloaded from the document store on an interval; domain lookups go to
//! the store on every call.

pub mod api_keys;
pub mod caches;
pub mod domains;
pub mod error;
pub mod origin;
pub mod ranges;
pub mod reserved;
pub mod service;
pub mod snapshot;
pub mod store;
pub mod zones;

pub use error::{Result, RoutingError};
pub use service::GeoRoutingService;
