use std::{any::Any, net::SocketAddr, sync::Arc};

use anyhow::{Context, Result};
use axum::{
    Router,
    http::{HeaderValue, StatusCode},
    response::Response,
    routing::get,
};
use be_auth_core::JwtConfig;
use be_auth_service::init_auth_service;
use be_authz::{AuthzState, authz_middleware, error_response};
use be_card_service::init_card_service;
use be_catalog_service::init_catalog_service;
use be_payment_service::{PaymeConfig, init_payment_service};
use be_remote_db::DatabaseManager;
use be_storage::StorageService;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

const DEFAULT_CORS_ORIGINS: &str = "http://localhost:3000";

/// Configuration for running the monolith server.
pub struct ServerConfig {
    pub database_url: String,
    pub http_addr: SocketAddr,
    /// When this receiver gets a value, the server shuts down gracefully.
    pub shutdown: tokio::sync::watch::Receiver<()>,
}

/// Everything the HTTP services share once the process is configured.
pub struct Services {
    pub db: Arc<DatabaseManager>,
    pub jwt_config: JwtConfig,
    pub storage: Arc<StorageService>,
    pub payme: PaymeConfig,
}

fn build_cors() -> CorsLayer {
    let allowed: Vec<HeaderValue> = std::env::var("CORS_ALLOWED_ORIGINS")
        .unwrap_or_else(|_| DEFAULT_CORS_ORIGINS.into())
        .split(',')
        .filter_map(|s| {
            let s = s.trim();
            if s.is_empty() || s == "*" {
                return None;
            }
            s.parse::<HeaderValue>().ok()
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        (*s).to_string()
    } else {
        "unknown panic".to_string()
    };
    tracing::error!(%detail, "Request handler panicked");

    error_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal server error",
        Some(detail),
    )
}

/// Assembles every service router behind the authz middleware.
pub fn build_router(services: Services) -> Router {
    let Services {
        db,
        jwt_config,
        storage,
        payme,
    } = services;

    let health_route = Router::new().route("/health", get(|| async { StatusCode::OK }));

    let mut router = init_auth_service(db.clone(), Arc::new(jwt_config.clone()))
        .merge(init_catalog_service(db.clone()))
        .merge(init_card_service(db.clone(), storage.clone()))
        .merge(init_payment_service(db, payme))
        .merge(health_route);

    let config = storage.config();
    if let Some(root) = config.fs_root() {
        let mount = config.public_base_url.trim_end_matches('/');
        if mount.starts_with('/') && !mount.is_empty() {
            tracing::info!(root, mount, "Serving uploaded photos from disk");
            router = router.nest_service(mount, ServeDir::new(root));
        }
    }

    let authz_state = Arc::new(AuthzState::new(jwt_config));

    router
        .layer(axum::middleware::from_fn_with_state(
            authz_state,
            authz_middleware,
        ))
        .layer(build_cors())
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::custom(panic_response))
}

pub async fn run_server(config: ServerConfig) -> Result<()> {
    let db = Arc::new(
        DatabaseManager::new(&config.database_url)
            .await
            .context("Failed to connect to the database")?,
    );
    let jwt_config = JwtConfig::from_env().context("Failed to load JWT configuration")?;
    let storage =
        Arc::new(StorageService::from_env().context("Failed to initialize photo storage")?);
    let payme = PaymeConfig::from_env().context("Failed to load Payme configuration")?;

    let http_router = build_router(Services {
        db,
        jwt_config,
        storage,
        payme,
    });

    tracing::info!("Starting HTTP server at {}", config.http_addr);

    let mut http_shutdown = config.shutdown.clone();
    let http_listener = tokio::net::TcpListener::bind(config.http_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.http_addr))?;
    axum::serve(
        http_listener,
        http_router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        let _ = http_shutdown.changed().await;
        tracing::info!("Shutting down HTTP server...");
    })
    .await
    .context("HTTP server error")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::Request;
    use be_storage::{StorageBackend, StorageConfig};
    use secrecy::SecretString;
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;

    use super::*;

    struct App {
        router: Router,
        jwt: JwtConfig,
        dir: tempfile::TempDir,
    }

    /// The pool never connects, so only requests answered before a query are exercised.
    fn app() -> App {
        let dir = tempfile::tempdir().unwrap();
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/unused")
            .unwrap();
        let storage = StorageService::builder()
            .config(StorageConfig {
                backend: StorageBackend::FS {
                    root: dir.path().to_string_lossy().into_owned(),
                },
                public_base_url: "/uploads".to_string(),
            })
            .build()
            .unwrap();
        let jwt = JwtConfig::from_secret(&SecretString::from("monolith-test-secret"));

        let router = build_router(Services {
            db: Arc::new(DatabaseManager { pool }),
            jwt_config: jwt.clone(),
            storage: Arc::new(storage),
            payme: PaymeConfig {
                merchant_id: "merchant-1".into(),
                secret_key: SecretString::from("payme-secret"),
                checkout_url: "https://checkout.paycom.uz".into(),
            },
        });
        App { router, jwt, dir }
    }

    async fn send(router: &Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .unwrap();
        (
            status,
            serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null),
        )
    }

    #[tokio::test]
    async fn health_is_public() {
        let app = app();
        let (status, _) = send(
            &app.router,
            Request::get("/health").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn protected_routes_require_token() {
        let app = app();
        let (status, body) = send(
            &app.router,
            Request::get("/api/cards").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["status"], false);
        assert_eq!(body["message"], "Missing authorization header");
    }

    #[tokio::test]
    async fn token_reaches_card_handlers() {
        let app = app();
        let token = app.jwt.issue_token(7, "seller@example.com").unwrap();

        let (status, body) = send(
            &app.router,
            Request::get("/api/cards?page=0")
                .header("authorization", format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "page must be a positive integer");
    }

    #[tokio::test]
    async fn webhook_is_public_but_checks_credentials() {
        let app = app();
        let (status, body) = send(
            &app.router,
            Request::post("/api/payments/webhook")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"method":"GetStatement","params":{},"id":1}"#))
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["error"]["code"], -32504);
    }

    #[tokio::test]
    async fn uploaded_photos_are_served_without_token() {
        let app = app();
        let photo_dir = app.dir.path().join("cards/7");
        std::fs::create_dir_all(&photo_dir).unwrap();
        std::fs::write(photo_dir.join("abc.jpg"), b"jpeg-bytes").unwrap();

        let response = app
            .router
            .clone()
            .oneshot(
                Request::get("/uploads/cards/7/abc.jpg")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), 1024)
            .await
            .unwrap();
        assert_eq!(&bytes[..], b"jpeg-bytes");
    }
}
