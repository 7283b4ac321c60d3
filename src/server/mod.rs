//! Wires validated settings, a store and a validator into one router.

pub mod endpoints;
pub mod indexes;

use std::any::Any;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, State},
    http::HeaderValue,
    middleware::map_response,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use thiserror::Error;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{AllowOrigin, Any as AnyOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::auth::Authenticator;
use crate::config::AppConfig;
use crate::database::{DocumentStore, StoreError};
use crate::dsl::{Settings, SettingsError};
use crate::error::ApiError;
use crate::handlers::methods::panic_message;
use crate::middleware::{json_fallback, ApiResponse, ApiResult};
use crate::validation::Validator;

pub use endpoints::{compile, Wiring};
pub use indexes::ensure_indexes;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error("failed to prepare the store: {0}")]
    Store(#[from] StoreError),

    #[error("invalid CORS origin {0:?}")]
    InvalidOrigin(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub struct Server {
    router: Router,
}

impl Server {
    pub async fn assemble(
        settings: Settings,
        store: Arc<dyn DocumentStore>,
        validator: Validator,
        config: &AppConfig,
    ) -> Result<Self, ServerError> {
        settings.validate()?;
        ensure_indexes(store.as_ref(), &settings).await?;

        let wiring = Wiring {
            store: store.clone(),
            validator,
            authenticator: Authenticator::new(store.collection(&settings.auth.database, &settings.auth.collection)),
            scratch: store.collection(&settings.scratch.database, &settings.scratch.collection),
        };

        let mut router = Router::new().route("/health", get(health)).with_state(store);
        for (key, resource) in &settings.resources {
            router = router.merge(compile(key, resource, &settings, &wiring)?);
        }
        info!("Assembled {} resources", settings.resources.len());

        let mut router = router
            .fallback(|| async { ApiError::NotFound })
            .layer(map_response(json_fallback))
            .layer(CatchPanicLayer::custom(panic_response))
            .layer(DefaultBodyLimit::max(config.api.max_request_size_bytes));
        if config.security.enable_cors {
            router = router.layer(cors_layer(&config.security.cors_origins)?);
        }
        if config.api.enable_request_logging {
            router = router.layer(TraceLayer::new_for_http());
        }

        Ok(Self { router })
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serves until Ctrl-C.
    pub async fn run(self, addr: SocketAddr) -> Result<(), ServerError> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!("Listening on http://{}", listener.local_addr()?);
        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        info!("Server stopped");
        Ok(())
    }
}

/// GET /health
async fn health(State(store): State<Arc<dyn DocumentStore>>) -> ApiResult {
    store.ping().await?;
    Ok(ApiResponse::ok())
}

fn panic_response(payload: Box<dyn Any + Send + 'static>) -> Response {
    tracing::error!("Request handler panicked: {}", panic_message(payload.as_ref()));
    ApiError::Internal.into_response()
}

fn cors_layer(origins: &[String]) -> Result<CorsLayer, ServerError> {
    let allow_origin = if origins.is_empty() || origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        let origins = origins
            .iter()
            .map(|o| HeaderValue::from_str(o).map_err(|_| ServerError::InvalidOrigin(o.clone())))
            .collect::<Result<Vec<_>, _>>()?;
        AllowOrigin::list(origins)
    };
    Ok(CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(AnyOrigin)
        .allow_headers(AnyOrigin))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}
