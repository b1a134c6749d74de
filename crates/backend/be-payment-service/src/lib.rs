use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use be_remote_db::DatabaseManager;
use tower_governor::{
    GovernorLayer, governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor,
};
use tracing::{debug, warn};

pub mod config;
pub mod error;
pub mod generate;
pub mod rpc;
pub mod store;
pub mod webhook;

pub use config::PaymeConfig;
pub use error::PaymentError;
pub use rpc::{RpcRequest, RpcResponse, RpcResult, WebhookError};
pub use store::PaymentLedger;

pub struct AppState<L> {
    pub ledger: Arc<L>,
    pub config: PaymeConfig,
}

pub fn create_router<L: PaymentLedger>(state: Arc<AppState<L>>) -> Router {
    let generate_route = Router::new().route(
        "/api/payments/generate",
        get(generate::generate_payment::<L>),
    );

    let generate_governor = GovernorConfigBuilder::default()
        .per_second(6)
        .burst_size(10)
        .key_extractor(SmartIpKeyExtractor)
        .finish();
    let generate_route = match generate_governor {
        Some(config) => generate_route.layer(GovernorLayer::new(Arc::new(config))),
        None => {
            warn!("Invalid rate limit configuration, payment generation is not rate limited");
            generate_route
        }
    };

    let webhook_route = Router::new().route(
        "/api/payments/webhook",
        post(webhook::handle_webhook::<L>),
    );

    generate_route
        .merge(webhook_route)
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .with_state(state)
}

pub fn init_payment_service(db: Arc<DatabaseManager>, config: PaymeConfig) -> Router {
    debug!(merchant_id = %config.merchant_id, "Initializing payment service");

    create_router(Arc::new(AppState { ledger: db, config }))
}
