//! Application wiring: shared state, dependency construction and the router.

use axum::{
    http::{header, HeaderValue, Method, StatusCode},
    middleware::from_fn_with_state,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use serde_json::{json, Value};
use sqlx::PgPool;
use std::sync::Arc;
use thiserror::Error;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::config::{AppConfig, StorageBackend, TableConfig};
use crate::database::{
    DatabaseError, DatabaseManager, InMemoryTable, ManagerRegistry, PgTable, RoomStore, Table,
    TelemetryStore, TenantDirectory, UserDirectory,
};
use crate::device::{local::LocalDeviceRegistry, DeviceError, DeviceRegistry};
use crate::error::ApiError;
use crate::handlers::{protected, public};
use crate::identity::{local::LocalIdentityProvider, IdentityError, IdentityProvider};
use crate::middleware::jwt_auth_middleware;
use crate::services::auth_service::AuthService;
use crate::services::office_service::OfficeService;
use crate::services::role_resolution::RoleResolver;
use crate::services::room_service::RoomService;
use crate::services::telemetry_service::TelemetryService;
use crate::services::user_service::UserService;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Storage: {0}")]
    Database(#[from] DatabaseError),

    #[error("Identity provider: {0}")]
    Identity(#[from] IdentityError),

    #[error("Device registry: {0}")]
    Device(#[from] DeviceError),
}

/// Backend reported by `/health`
#[derive(Clone)]
pub enum StorageHealth {
    Memory,
    Postgres(PgPool),
}

/// The five logical collections plus the identity and device directories
pub struct Tables {
    pub office: Arc<dyn Table>,
    pub manager: Arc<dyn Table>,
    pub user: Arc<dyn Table>,
    pub room_config: Arc<dyn Table>,
    pub sensor_log: Arc<dyn Table>,
    pub identity: Arc<dyn Table>,
    pub devices: Arc<dyn Table>,
}

impl Tables {
    pub fn in_memory(names: &TableConfig) -> Self {
        Self {
            office: Arc::new(InMemoryTable::new(&names.office)),
            manager: Arc::new(InMemoryTable::new(&names.manager)),
            user: Arc::new(InMemoryTable::new(&names.user)),
            room_config: Arc::new(InMemoryTable::new(&names.room_config)),
            sensor_log: Arc::new(InMemoryTable::new(&names.sensor_log)),
            identity: Arc::new(InMemoryTable::new(&names.identity)),
            devices: Arc::new(InMemoryTable::new(&names.device)),
        }
    }

    pub fn postgres(pool: &PgPool, names: &TableConfig) -> Self {
        Self {
            office: Arc::new(PgTable::new(pool.clone(), &names.office)),
            manager: Arc::new(PgTable::new(pool.clone(), &names.manager)),
            user: Arc::new(PgTable::new(pool.clone(), &names.user)),
            room_config: Arc::new(PgTable::new(pool.clone(), &names.room_config)),
            sensor_log: Arc::new(PgTable::new(pool.clone(), &names.sensor_log)),
            identity: Arc::new(PgTable::new(pool.clone(), &names.identity)),
            devices: Arc::new(PgTable::new(pool.clone(), &names.device)),
        }
    }
}

/// Services shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub identity: Arc<dyn IdentityProvider>,
    pub auth: Arc<AuthService>,
    pub offices: Arc<OfficeService>,
    pub rooms: Arc<RoomService>,
    pub telemetry: Arc<TelemetryService>,
    pub users: Arc<UserService>,
    pub storage: StorageHealth,
    pub cors_origins: Vec<String>,
}

impl AppState {
    pub fn new(
        config: &AppConfig,
        tables: Tables,
        identity: Arc<dyn IdentityProvider>,
        devices: Arc<dyn DeviceRegistry>,
        storage: StorageHealth,
    ) -> Self {
        let tenants = TenantDirectory::new(tables.office);
        let managers = ManagerRegistry::new(tables.manager);
        let users = UserDirectory::new(tables.user);
        let resolver = RoleResolver::new(tenants.clone(), managers.clone());

        Self {
            auth: Arc::new(AuthService::new(
                identity.clone(),
                tenants.clone(),
                users.clone(),
                resolver,
            )),
            offices: Arc::new(OfficeService::new(identity.clone(), tenants.clone(), managers.clone())),
            users: Arc::new(UserService::new(identity.clone(), users, tenants.clone(), managers)),
            rooms: Arc::new(RoomService::new(
                tenants,
                RoomStore::new(tables.room_config),
                devices,
                config.devices.policy_name.clone(),
            )),
            telemetry: Arc::new(TelemetryService::new(
                TelemetryStore::new(tables.sensor_log),
                config.telemetry.default_limit,
            )),
            identity,
            storage,
            cors_origins: config.security.cors_origins.clone(),
        }
    }

    /// Build every dependency the configuration asks for
    pub async fn from_config(config: &AppConfig) -> Result<Self, StartupError> {
        let (tables, storage) = match config.storage.backend {
            StorageBackend::Memory => {
                info!("Using in-memory storage");
                (Tables::in_memory(&config.tables), StorageHealth::Memory)
            }
            StorageBackend::Postgres => {
                let pool = DatabaseManager::connect(&config.storage).await?;
                (
                    Tables::postgres(&pool, &config.tables),
                    StorageHealth::Postgres(pool),
                )
            }
        };

        let identity: Arc<dyn IdentityProvider> = Arc::new(
            LocalIdentityProvider::persistent(config.identity.clone(), tables.identity.clone()).await?,
        );
        let devices: Arc<dyn DeviceRegistry> = Arc::new(
            LocalDeviceRegistry::persistent([config.devices.policy_name.clone()], tables.devices.clone())
                .await?,
        );

        Ok(Self::new(config, tables, identity, devices, storage))
    }
}

pub fn router(state: AppState) -> Router {
    let cors = cors_layer(&state.cors_origins);

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .merge(auth_public_routes())
        .merge(api_routes(state.clone()))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn auth_public_routes() -> Router<AppState> {
    use public::auth;

    Router::new()
        .route("/auth/signup", post(auth::signup_post))
        .route("/auth/confirm", post(auth::confirm_post))
        .route("/auth/resend-code", post(auth::resend_code_post))
        .route("/auth/login", post(auth::login_post))
        .route("/auth/change-password", post(auth::change_password_post))
        .route("/auth/forgot-password", post(auth::forgot_password_post))
        .route("/auth/confirm-forgot-password", post(auth::confirm_forgot_password_post))
        .route("/auth/logout", post(auth::logout_post))
}

fn api_routes(state: AppState) -> Router<AppState> {
    use protected::{offices, rooms, telemetry, users};

    Router::new()
        .route(
            "/api/offices",
            get(offices::list_get)
                .post(offices::create_post)
                .put(offices::update_put)
                .delete(offices::delete_office),
        )
        .route("/api/offices/detail", get(offices::detail_get))
        .route("/api/rooms", get(rooms::list_get).post(rooms::provision_post))
        .route("/api/rooms/config", get(rooms::config_get).put(rooms::config_put))
        .route(
            "/api/telemetry",
            get(telemetry::telemetry_get).post(telemetry::telemetry_post),
        )
        .route("/api/users", get(users::list_get))
        .route("/api/users/profile", put(users::profile_put))
        .route_layer(from_fn_with_state(state, jwt_auth_middleware))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ]);

    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }

    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin {}", origin);
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(parsed))
}

async fn root() -> Json<Value> {
    Json(json!({
        "success": true,
        "data": {
            "name": "Smart Office API",
            "version": env!("CARGO_PKG_VERSION"),
            "description": "Multi-tenant office, room and telemetry management",
            "endpoints": {
                "auth": "/auth/* (public - signup, confirmation, login, passwords)",
                "offices": "/api/offices[/detail] (protected)",
                "rooms": "/api/rooms[/config] (protected)",
                "telemetry": "/api/telemetry (protected)",
                "users": "/api/users[/profile] (protected)",
            }
        }
    }))
}

async fn health(axum::extract::State(state): axum::extract::State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();

    let check = match &state.storage {
        StorageHealth::Memory => Ok("memory"),
        StorageHealth::Postgres(pool) => DatabaseManager::health_check(pool).await.map(|_| "postgres"),
    };

    match check {
        Ok(backend) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "storage": backend
                }
            })),
        ),
        Err(e) => {
            let mut body = ApiError::service_unavailable("storage unavailable").to_json();
            body["data"] = json!({
                "status": "degraded",
                "timestamp": now,
                "storage_error": e.to_string()
            });
            (StatusCode::SERVICE_UNAVAILABLE, Json(body))
        }
    }
}
