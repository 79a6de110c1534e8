use edge_core::api_keys::ApiKeyService;
use edge_core::domains::DomainRegistry;
use edge_core::GeoRoutingService;
use std::sync::Arc;

use crate::auth::OperatorTokens;

/// Shared handler state. Every field is cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub routing: GeoRoutingService,
    pub domains: DomainRegistry,
    pub api_keys: ApiKeyService,
    pub operators: Arc<OperatorTokens>,
}
