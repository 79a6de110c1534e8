/// HTTP surface of the control plane.
///
/// Routing queries are public. Domain, URL and API-key management require an
/// operator bearer token and act on domains that operator owns.
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use edge_core::caches::CacheSelection;
use edge_core::domains::NewUrlConfig;
use edge_core::service::{RouteDecision, RouteQuery};
use edge_core::RoutingError;
use edge_proto::records::LegacyDomainRecord;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::Operator;
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    let public = Router::new()
        .route("/api/salud", get(health))
        .route("/api/obtener-pais", get(country_for_ip))
        .route("/api/obtener-cache-zonal", get(zonal_cache))
        .route("/api/ip-to-country", get(list_ranges))
        .route("/api/configuracion-dominio", get(domain_config))
        .route("/api/enrutar", get(route_request))
        .route("/api/validar-api-key", post(validate_api_key));

    let operator = Router::new()
        .route("/api/dominios", get(list_domains).post(register_domain))
        .route("/api/dominios/{dominio}", delete(delete_domain))
        .route("/api/dominios/{dominio}/verificar", post(verify_domain))
        .route("/api/dominios/{dominio}/urls", get(list_urls).post(add_url))
        .route("/api/dominios/{dominio}/urls/{url_id}", delete(delete_url))
        .route(
            "/api/dominios/{dominio}/api-keys",
            get(list_api_keys).post(issue_api_key),
        )
        .route(
            "/api/dominios/{dominio}/api-keys/{key_id}",
            delete(revoke_api_key),
        );

    public
        .merge(operator)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ── Errors ───────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum ApiError {
    Unauthorized(&'static str),
    Routing(RoutingError),
}

impl From<RoutingError> for ApiError {
    fn from(e: RoutingError) -> Self {
        ApiError::Routing(e)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Routing(e) => match e {
                RoutingError::InvalidInput(_)
                | RoutingError::InvalidAddress(_)
                | RoutingError::ReservedName(_)
                | RoutingError::AlreadyRegistered(_) => StatusCode::BAD_REQUEST,
                RoutingError::NotFound(_) => StatusCode::NOT_FOUND,
                RoutingError::Forbidden(_) => StatusCode::FORBIDDEN,
                RoutingError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                RoutingError::Corrupt { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ApiError::Unauthorized(msg) => msg.to_string(),
            ApiError::Routing(e) => e.to_string(),
        };
        if status.is_server_error() {
            tracing::warn!(status = status.as_u16(), "Request failed: {}", message);
        }
        (status, Json(json!({ "exito": false, "error": message }))).into_response()
    }
}

type ApiResult = Result<Json<serde_json::Value>, ApiError>;

// ── Public routing queries ───────────────────────────────────────────

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "estado": "ok", "mensaje": "API funcionando correctamente" }))
}

#[derive(Deserialize)]
struct IpQuery {
    ip: Option<String>,
}

async fn country_for_ip(State(state): State<AppState>, Query(q): Query<IpQuery>) -> ApiResult {
    let country = state.routing.route_by_ip(q.ip.as_deref().unwrap_or_default())?;
    Ok(Json(json!({ "exito": country.is_some(), "pais": country })))
}

#[derive(Deserialize)]
struct CacheQuery {
    pais: Option<String>,
    /// Accepted for compatibility; selection does not depend on it.
    #[allow(dead_code)]
    dominio: Option<String>,
}

#[derive(Serialize)]
struct CacheResponse {
    exito: bool,
    #[serde(flatten)]
    cache: CacheSelection,
}

async fn zonal_cache(
    State(state): State<AppState>,
    Query(q): Query<CacheQuery>,
) -> Result<Response, ApiError> {
    let selection = state
        .routing
        .select_nearest_cache(q.pais.as_deref().unwrap_or_default())?;
    Ok(match selection {
        Some(cache) => Json(CacheResponse { exito: true, cache }).into_response(),
        None => Json(json!({ "exito": false, "ip_cache": null })).into_response(),
    })
}

async fn list_ranges(State(state): State<AppState>) -> ApiResult {
    let rangos = state.routing.list_ranges()?;
    Ok(Json(json!({ "exito": true, "rangos": rangos })))
}

#[derive(Deserialize)]
struct DomainQuery {
    dominio: Option<String>,
}

async fn domain_config(State(state): State<AppState>, Query(q): Query<DomainQuery>) -> ApiResult {
    let config = state
        .routing
        .route_by_domain(q.dominio.as_deref().unwrap_or_default())
        .await?;
    Ok(Json(json!({ "exito": config.is_some(), "configuracion": config })))
}

#[derive(Deserialize)]
struct RouteParams {
    ip: Option<String>,
    pais: Option<String>,
    dominio: Option<String>,
}

#[derive(Serialize)]
struct RouteResponse {
    exito: bool,
    #[serde(flatten)]
    decision: RouteDecision,
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

async fn route_request(
    State(state): State<AppState>,
    Query(q): Query<RouteParams>,
) -> Result<Json<RouteResponse>, ApiError> {
    let decision = state
        .routing
        .route_request(RouteQuery {
            ip: non_blank(&q.ip),
            country: non_blank(&q.pais),
            domain: non_blank(&q.dominio),
        })
        .await?;
    let exito = decision.cache.is_some() || decision.origin.is_some();
    Ok(Json(RouteResponse { exito, decision }))
}

#[derive(Deserialize)]
struct ValidateKeyBody {
    #[serde(default)]
    dominio: String,
    #[serde(default)]
    api_key: String,
}

async fn validate_api_key(
    State(state): State<AppState>,
    Json(body): Json<ValidateKeyBody>,
) -> ApiResult {
    let valid = state.api_keys.validate(&body.dominio, &body.api_key).await?;
    if valid {
        Ok(Json(json!({ "exito": true, "valida": true })))
    } else {
        Ok(Json(json!({
            "exito": false,
            "valida": false,
            "error": "API key inválida para este dominio",
        })))
    }
}

// ── Operator: domains ────────────────────────────────────────────────

/// A domain record as listed to its owner, with the document id alongside.
#[derive(Serialize)]
struct DomainView<'a> {
    id: &'a str,
    #[serde(flatten)]
    record: &'a LegacyDomainRecord,
}

impl<'a> DomainView<'a> {
    fn of(record: &'a LegacyDomainRecord) -> Self {
        Self {
            id: &record.domain,
            record,
        }
    }
}

async fn list_domains(State(state): State<AppState>, Operator(owner): Operator) -> ApiResult {
    let records = state.domains.list(&owner).await?;
    let dominios: Vec<_> = records.iter().map(DomainView::of).collect();
    Ok(Json(json!({ "exito": true, "dominios": dominios })))
}

#[derive(Deserialize)]
struct RegisterBody {
    #[serde(default)]
    nombre: String,
    servidor_origen: Option<String>,
}

async fn register_domain(
    State(state): State<AppState>,
    Operator(owner): Operator,
    Json(body): Json<RegisterBody>,
) -> ApiResult {
    let registration = state
        .domains
        .register(&owner, &body.nombre, body.servidor_origen.as_deref())
        .await?;
    Ok(Json(json!({
        "exito": true,
        "dominio": DomainView::of(&registration.record),
        "instrucciones": registration.instructions,
    })))
}

async fn delete_domain(
    State(state): State<AppState>,
    Operator(owner): Operator,
    Path(dominio): Path<String>,
) -> ApiResult {
    state.domains.delete(&owner, &dominio).await?;
    Ok(Json(json!({ "exito": true, "mensaje": "Dominio eliminado" })))
}

async fn verify_domain(
    State(state): State<AppState>,
    Operator(owner): Operator,
    Path(dominio): Path<String>,
) -> ApiResult {
    let record = state.domains.verify(&owner, &dominio).await?;
    Ok(Json(json!({
        "exito": true,
        "verificado": record.verified,
        "mensaje": "Dominio verificado exitosamente",
    })))
}

// ── Operator: URL configs ────────────────────────────────────────────

async fn list_urls(
    State(state): State<AppState>,
    Operator(owner): Operator,
    Path(dominio): Path<String>,
) -> ApiResult {
    let urls = state.domains.list_urls(&owner, &dominio).await?;
    Ok(Json(json!({ "exito": true, "urls": urls })))
}

async fn add_url(
    State(state): State<AppState>,
    Operator(owner): Operator,
    Path(dominio): Path<String>,
    Json(body): Json<NewUrlConfig>,
) -> ApiResult {
    let url = state.domains.add_url(&owner, &dominio, body).await?;
    Ok(Json(json!({ "exito": true, "url": url })))
}

async fn delete_url(
    State(state): State<AppState>,
    Operator(owner): Operator,
    Path((dominio, url_id)): Path<(String, String)>,
) -> ApiResult {
    state.domains.delete_url(&owner, &dominio, &url_id).await?;
    Ok(Json(json!({ "exito": true, "mensaje": "URL eliminada" })))
}

// ── Operator: API keys ───────────────────────────────────────────────

async fn list_api_keys(
    State(state): State<AppState>,
    Operator(owner): Operator,
    Path(dominio): Path<String>,
) -> ApiResult {
    let record = state.domains.owned(&owner, &dominio).await?;
    let keys = state.api_keys.list(&record.domain).await?;
    Ok(Json(json!({ "exito": true, "api_keys": keys })))
}

#[derive(Deserialize, Default)]
struct IssueKeyBody {
    nombre: Option<String>,
}

async fn issue_api_key(
    State(state): State<AppState>,
    Operator(owner): Operator,
    Path(dominio): Path<String>,
    Json(body): Json<IssueKeyBody>,
) -> ApiResult {
    let record = state.domains.owned(&owner, &dominio).await?;
    let key = state
        .api_keys
        .issue(&record.domain, body.nombre.as_deref())
        .await?;
    Ok(Json(json!({ "exito": true, "api_key": key })))
}

async fn revoke_api_key(
    State(state): State<AppState>,
    Operator(owner): Operator,
    Path((dominio, key_id)): Path<(String, String)>,
) -> ApiResult {
    let record = state.domains.owned(&owner, &dominio).await?;
    state.api_keys.revoke(&record.domain, &key_id).await?;
    Ok(Json(json!({ "exito": true, "mensaje": "API Key eliminada" })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::OperatorTokens;
    use axum::body::Body;
    use axum::http::{header, Request};
    use edge_core::api_keys::ApiKeyService;
    use edge_core::domains::DomainRegistry;
    use edge_core::origin::OriginResolver;
    use edge_core::reserved::ReservedNames;
    use edge_core::snapshot::SnapshotCell;
    use edge_core::store::{DocumentStore, MemoryStore};
    use edge_core::zones::ZoneFallbackMap;
    use edge_core::GeoRoutingService;
    use edge_proto::config::OperatorConfig;
    use serde_json::Value;
    use std::sync::Arc;
    use tower::ServiceExt;

    const TOKEN_A: &str = "token-operator-a-0001";
    const TOKEN_B: &str = "token-operator-b-0002";

    async fn app() -> Router {
        let snapshot = Arc::new(SnapshotCell::new());
        let store: Arc<dyn DocumentStore> = Arc::new(
            MemoryStore::from_seed(json!({
                "ip_to_country": {
                    "r1": {"inicio": 1000, "fin": 2000, "pais": "CR"}
                },
                "caches_zonales": {
                    "c1": {"pais": "US", "ip": "1.2.3.4", "puerto": 80, "activo": true}
                },
                "registros_dns": {
                    "a.com": {"ips": ["10.0.0.5"], "health_check": {"puerto": 8080}}
                }
            }))
            .unwrap(),
        );
        snapshot.refresh(store.as_ref()).await.unwrap();

        let state = AppState {
            routing: GeoRoutingService::new(
                snapshot,
                ZoneFallbackMap::builtin(),
                OriginResolver::new(store.clone()),
            ),
            domains: DomainRegistry::new(
                store.clone(),
                Arc::new(ReservedNames::parse("google.com\n")),
            ),
            api_keys: ApiKeyService::new(store),
            operators: Arc::new(OperatorTokens::new(vec![
                OperatorConfig {
                    id: "ops-a".into(),
                    token: TOKEN_A.into(),
                },
                OperatorConfig {
                    id: "ops-b".into(),
                    token: TOKEN_B.into(),
                },
            ])),
        };
        router(state)
    }

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let resp = app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn authed(method: &str, uri: &str, token: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = send(&app().await, get_req("/api/salud")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["estado"], "ok");
    }

    #[tokio::test]
    async fn test_country_lookup() {
        let app = app().await;
        let (status, body) = send(&app, get_req("/api/obtener-pais?ip=0.0.5.220")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"exito": true, "pais": "CR"}));

        let (status, body) = send(&app, get_req("/api/obtener-pais?ip=8.8.8.8")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"exito": false, "pais": null}));
    }

    #[tokio::test]
    async fn test_country_lookup_bad_input() {
        let app = app().await;
        let (status, body) = send(&app, get_req("/api/obtener-pais?ip=1.2.3")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["exito"], false);
        assert!(body["error"].is_string());

        let (status, _) = send(&app, get_req("/api/obtener-pais")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_lookup_before_snapshot_is_unavailable() {
        let app = router_without_snapshot();
        let (status, body) = send(&app, get_req("/api/obtener-pais?ip=1.1.1.1")).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["exito"], false);
    }

    fn router_without_snapshot() -> Router {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
        router(AppState {
            routing: GeoRoutingService::new(
                Arc::new(SnapshotCell::new()),
                ZoneFallbackMap::builtin(),
                OriginResolver::new(store.clone()),
            ),
            domains: DomainRegistry::new(store.clone(), Arc::new(ReservedNames::default())),
            api_keys: ApiKeyService::new(store),
            operators: Arc::new(OperatorTokens::new(Vec::new())),
        })
    }

    #[tokio::test]
    async fn test_zonal_cache_with_fallback() {
        let app = app().await;
        let (status, body) = send(&app, get_req("/api/obtener-cache-zonal?pais=MX")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({
                "exito": true,
                "ip_cache": "1.2.3.4",
                "puerto": 80,
                "pais_origen": "MX",
                "pais_cache": "US",
            })
        );

        let (_, body) = send(&app, get_req("/api/obtener-cache-zonal?pais=ZZ")).await;
        assert_eq!(body, json!({"exito": false, "ip_cache": null}));

        let (status, _) = send(&app, get_req("/api/obtener-cache-zonal")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_range_listing() {
        let (status, body) = send(&app().await, get_req("/api/ip-to-country")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["rangos"][0]["codigo_pais"], "CR");
        assert_eq!(body["rangos"][0]["nombre_pais"], "Costa Rica");
        assert_eq!(body["rangos"][0]["ip_inicio"], "0.0.3.232");
    }

    #[tokio::test]
    async fn test_domain_config() {
        let app = app().await;
        let (_, body) = send(&app, get_req("/api/configuracion-dominio?dominio=a.com")).await;
        assert_eq!(body["exito"], true);
        assert_eq!(body["configuracion"]["servidor_origen"], "http://10.0.0.5:8080");

        let (status, body) = send(&app, get_req("/api/configuracion-dominio?dominio=x.com")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"exito": false, "configuracion": null}));
    }

    #[tokio::test]
    async fn test_composite_route() {
        let app = app().await;
        let (status, body) = send(&app, get_req("/api/enrutar?pais=MX&dominio=a.com")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["exito"], true);
        assert_eq!(body["pais"], "MX");
        assert_eq!(body["cache"]["pais_cache"], "US");
        assert_eq!(body["configuracion"]["nombre"], "a.com");

        let (status, _) = send(&app, get_req("/api/enrutar")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_operator_routes_require_token() {
        let app = app().await;
        let (status, body) = send(&app, get_req("/api/dominios")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["exito"], false);

        let (status, _) = send(&app, authed("GET", "/api/dominios", "wrong-token-000000", json!({}))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_domain_lifecycle() {
        let app = app().await;

        let (status, body) = send(
            &app,
            authed("POST", "/api/dominios", TOKEN_A, json!({"nombre": "shop.com"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["dominio"]["id"], "shop.com");
        assert_eq!(body["dominio"]["verificado"], false);
        let token = body["dominio"]["txt_record"].as_str().unwrap().to_string();
        assert_eq!(body["instrucciones"], format!("Agregar registro TXT: {}", token));

        let (status, _) = send(
            &app,
            authed("POST", "/api/dominios", TOKEN_B, json!({"nombre": "shop.com"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            &app,
            authed("POST", "/api/dominios", TOKEN_A, json!({"nombre": "GOOGLE.com"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, body) = send(&app, authed("GET", "/api/dominios", TOKEN_A, json!({}))).await;
        assert_eq!(body["dominios"].as_array().unwrap().len(), 1);
        let (_, body) = send(&app, authed("GET", "/api/dominios", TOKEN_B, json!({}))).await;
        assert_eq!(body["dominios"].as_array().unwrap().len(), 0);

        let (status, _) = send(
            &app,
            authed("POST", "/api/dominios/shop.com/verificar", TOKEN_B, json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, body) = send(
            &app,
            authed("POST", "/api/dominios/shop.com/verificar", TOKEN_A, json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["verificado"], true);

        let (status, _) = send(&app, authed("DELETE", "/api/dominios/shop.com", TOKEN_A, json!({}))).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = send(&app, authed("DELETE", "/api/dominios/shop.com", TOKEN_A, json!({}))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_urls_and_api_keys() {
        let app = app().await;
        send(
            &app,
            authed("POST", "/api/dominios", TOKEN_A, json!({"nombre": "cdn.com"})),
        )
        .await;

        let (status, body) = send(
            &app,
            authed("POST", "/api/dominios/cdn.com/urls", TOKEN_A, json!({"path": "/img"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["url"]["tamanio_cache_mb"], 50);
        let url_id = body["url"]["id"].as_str().unwrap().to_string();

        let (_, body) = send(&app, authed("GET", "/api/dominios/cdn.com/urls", TOKEN_A, json!({}))).await;
        assert_eq!(body["urls"].as_array().unwrap().len(), 1);

        let uri = format!("/api/dominios/cdn.com/urls/{}", url_id);
        let (status, _) = send(&app, authed("DELETE", &uri, TOKEN_A, json!({}))).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = send(&app, authed("DELETE", &uri, TOKEN_A, json!({}))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = send(
            &app,
            authed("POST", "/api/dominios/cdn.com/api-keys", TOKEN_A, json!({"nombre": "edge"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let key = body["api_key"]["key"].as_str().unwrap().to_string();
        let key_id = body["api_key"]["id"].as_str().unwrap().to_string();
        assert_eq!(key.len(), 32);

        let validate = |key: String| {
            Request::builder()
                .method("POST")
                .uri("/api/validar-api-key")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json!({"dominio": "cdn.com", "api_key": key}).to_string()))
                .unwrap()
        };
        let (_, body) = send(&app, validate(key.clone())).await;
        assert_eq!(body, json!({"exito": true, "valida": true}));

        let (status, _) = send(
            &app,
            authed("GET", "/api/dominios/cdn.com/api-keys", TOKEN_B, json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let uri = format!("/api/dominios/cdn.com/api-keys/{}", key_id);
        let (status, _) = send(&app, authed("DELETE", &uri, TOKEN_A, json!({}))).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(&app, validate(key)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["valida"], false);
    }
}
