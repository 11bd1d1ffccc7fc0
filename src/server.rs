use crate::algorithms::build_limiter;
use crate::config::Config;
use crate::error::ThrottleResult;
use crate::handlers::{check_rate_limit, get_rate_limit, health_check, stats, AppState};
use crate::key_generator::KeyGenerator;
use crate::middleware::{logging_middleware, rate_limit_middleware};
use crate::reaper::Reaper;
use axum::routing::{get, post};
use axum::{middleware, Router};
use std::net::SocketAddr;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub struct Server {
    app: Router,
    bind_addr: SocketAddr,
    reaper: Reaper,
}

impl Server {
    /// Build the limiter, start its idle reaper and assemble the router.
    /// Must be called from within a tokio runtime.
    pub fn new(config: Config) -> ThrottleResult<Self> {
        config.validate()?;

        let limiter = build_limiter(&config)?;
        let reaper = Reaper::spawn(limiter.clone(), config.cleanup_interval);
        let state = AppState::new(
            limiter,
            KeyGenerator::new(config.trust_forwarded_headers),
            config.enabled,
        );

        Ok(Self {
            app: create_app(state),
            bind_addr: config.bind_addr,
            reaper,
        })
    }

    pub async fn run(self) -> ThrottleResult<()> {
        let Server {
            app,
            bind_addr,
            reaper,
        } = self;

        let listener = tokio::net::TcpListener::bind(bind_addr).await?;

        tracing::info!("linkthrottle listening on {}", listener.local_addr()?);
        tracing::info!("Health check available at /health");

        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await?;

        reaper.shutdown().await;
        tracing::info!("linkthrottle stopped");

        Ok(())
    }
}

/// Full service router: unguarded health/stats plus the gated limiter API.
pub fn create_app(state: AppState) -> Router {
    let limiter_api = Router::new()
        .route("/rate-limit/:key", get(get_rate_limit))
        .route("/rate-limit/:key/check", post(check_rate_limit));

    Router::new()
        .route("/health", get(health_check))
        .route("/stats", get(stats))
        .merge(with_rate_limit(limiter_api, state.clone()))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(middleware::from_fn(logging_middleware)),
        )
}

/// Put the per-client gate in front of every route of `router`.
///
/// Serve the result with `into_make_service_with_connect_info::<SocketAddr>()`
/// so clients are told apart by peer address.
pub fn with_rate_limit<S>(router: Router<S>, state: AppState) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router.layer(middleware::from_fn_with_state(state, rate_limit_middleware))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        },
    }
}
