//! Service lifecycle
//!
//! [`App`] owns the whole runtime of a service: configuration, the
//! middleware chain, the main and debug listeners, the database pool, and
//! coordinated shutdown. A minimal service is:
//!
//! ```ignore
//! #[tokio::main]
//! async fn main() -> svckit::error::Result<()> {
//!     let mut app = App::new("billing", env!("CARGO_PKG_VERSION"))
//!         .route("/invoices", get(list_invoices));
//!     app.initialize().await?;
//!     svckit::observability::init_tracing(app.config().unwrap())?;
//!     app.start(CancellationToken::new()).await
//! }
//! ```

use axum::{http::StatusCode, routing::get, routing::MethodRouter, Json, Router};
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tower_http::{limit::RequestBodyLimitLayer, timeout::TimeoutLayer};

use crate::config::Config;
#[cfg(feature = "database")]
use crate::db::Database;
use crate::envelope::ApiResponse;
use crate::error::{ApiError, Error, Result};
use crate::health::{HealthInfo, HEALTH_PATH};
use crate::middleware::{
    access_log, catch_panic_layer, error_envelope, request_id_layer,
    request_id_propagation_layer, sensitive_headers_layer,
};

/// Time allowed for in-flight requests after shutdown is requested
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Lifecycle manager for one service process.
///
/// Build with routes, then `initialize`, then `start`. Initialization is
/// idempotent; binding and serving happen in `start` so construction never
/// touches the network.
pub struct App {
    name: String,
    version: String,
    config: Option<Config>,
    routes: Router,
    app: Option<Router>,
    listener: Option<TcpListener>,
    local_addr: Option<SocketAddr>,
    #[cfg(feature = "database")]
    db: Option<Database>,
    health_disabled: bool,
    initialized: bool,
}

impl App {
    /// Create an app with no routes
    #[must_use]
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            config: None,
            routes: Router::new(),
            app: None,
            listener: None,
            local_addr: None,
            #[cfg(feature = "database")]
            db: None,
            health_disabled: false,
            initialized: false,
        }
    }

    /// Inject configuration instead of loading it from files and environment
    #[must_use]
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Register a route on the main listener
    #[must_use]
    pub fn route(mut self, path: &str, handler: MethodRouter) -> Self {
        self.routes = self.routes.route(path, handler);
        self
    }

    /// Merge a pre-built router into the main listener
    #[must_use]
    pub fn merge(mut self, router: Router) -> Self {
        self.routes = self.routes.merge(router);
        self
    }

    /// Skip registering the built-in health endpoint
    #[must_use]
    pub fn disable_health_endpoint(mut self) -> Self {
        self.health_disabled = true;
        self
    }

    /// Loaded configuration, available after [`App::initialize`]
    pub fn config(&self) -> Option<&Config> {
        self.config.as_ref()
    }

    /// The database opened at initialization, when enabled
    #[cfg(feature = "database")]
    pub fn db(&self) -> Option<&Database> {
        self.db.as_ref()
    }

    /// Address of the main listener once bound
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Load configuration, open the database when enabled, and assemble the
    /// middleware chain around the registered routes.
    ///
    /// Safe to call more than once; later calls return immediately.
    pub async fn initialize(&mut self) -> Result<()> {
        if self.initialized {
            return Ok(());
        }

        let config = match self.config.take() {
            Some(config) => config,
            None => Config::load()?,
        };

        #[cfg(feature = "database")]
        if config.database.enabled {
            self.db = Some(Database::open(&config.database).await?);
        }

        let mut router = std::mem::take(&mut self.routes).fallback(route_not_found);
        if !self.health_disabled {
            let info = HealthInfo::new(&self.name, &self.version);
            router = router.route(
                HEALTH_PATH,
                get(move || {
                    let info = info.clone();
                    async move { Json(info) }
                }),
            );
        }

        // last layer listed is applied outermost; the request-id layers sit
        // outside recovery so replacement responses still carry the id
        let app = router
            .layer(axum::middleware::from_fn(access_log))
            .layer(RequestBodyLimitLayer::new(
                config.service.body_limit_mb * 1024 * 1024,
            ))
            .layer(TimeoutLayer::with_status_code(
                StatusCode::REQUEST_TIMEOUT,
                config.service.read_timeout(),
            ))
            .layer(sensitive_headers_layer())
            .layer(axum::middleware::from_fn(error_envelope))
            .layer(catch_panic_layer())
            .layer(request_id_propagation_layer())
            .layer(request_id_layer());

        self.app = Some(app);
        self.config = Some(config);
        self.initialized = true;
        Ok(())
    }

    /// Bind the main listener without serving.
    ///
    /// Useful in tests that need the bound address before handing the app to
    /// a task. [`App::start`] binds on its own when this was not called.
    /// Re-binding is a no-op returning the existing address.
    pub async fn bind(&mut self) -> Result<SocketAddr> {
        if let Some(addr) = self.local_addr {
            return Ok(addr);
        }
        self.initialize().await?;
        let port = self
            .config
            .as_ref()
            .map(|c| c.service.port)
            .unwrap_or_default();
        let listener = TcpListener::bind(SocketAddr::from(([0, 0, 0, 0], port))).await?;
        let addr = listener.local_addr()?;
        self.listener = Some(listener);
        self.local_addr = Some(addr);
        Ok(addr)
    }

    /// Serve until a termination signal arrives or `shutdown` is cancelled.
    ///
    /// A bind failure on the main port is fatal and returns before any
    /// request is served. The debug listener is best-effort; a bind failure
    /// there is logged and the service runs without it. After shutdown is
    /// requested, in-flight requests get [`SHUTDOWN_GRACE`] to finish before
    /// the process stops waiting on them. The database pool, when open, is
    /// closed on the way out.
    pub async fn start(&mut self, shutdown: CancellationToken) -> Result<()> {
        self.initialize().await?;
        self.bind().await?;

        let config = self
            .config
            .clone()
            .ok_or_else(|| Error::Internal("app not initialized".to_string()))?;
        let app = self
            .app
            .take()
            .ok_or_else(|| Error::Internal("server already started".to_string()))?;
        let listener = self
            .listener
            .take()
            .ok_or_else(|| Error::Internal("server already started".to_string()))?;

        tracing::info!(
            service = %self.name,
            addr = %listener.local_addr()?,
            "server listening"
        );

        // single token all listeners drain on, fed by signals or the caller
        let drain = CancellationToken::new();
        let trigger = tokio::spawn({
            let drain = drain.clone();
            async move {
                tokio::select! {
                    _ = shutdown_signal() => {}
                    _ = shutdown.cancelled() => {
                        tracing::info!("shutdown requested by caller");
                    }
                }
                drain.cancel();
            }
        });

        self.spawn_debug_server(&config, &drain).await;

        let server = axum::serve(listener, app)
            .with_graceful_shutdown({
                let drain = drain.clone();
                async move { drain.cancelled().await }
            })
            .into_future();
        tokio::pin!(server);

        let deadline = async {
            drain.cancelled().await;
            tokio::time::sleep(SHUTDOWN_GRACE).await;
        };

        let result = tokio::select! {
            res = &mut server => res.map_err(Error::from),
            _ = deadline => {
                tracing::warn!(grace_secs = SHUTDOWN_GRACE.as_secs(), "grace period elapsed, abandoning in-flight requests");
                Ok(())
            }
        };

        trigger.abort();

        #[cfg(feature = "database")]
        if let Some(db) = self.db.take() {
            db.close().await;
        }

        tracing::info!("server shutdown complete");
        result
    }

    /// Bind and serve the debug listener, sharing the drain token
    async fn spawn_debug_server(&self, config: &Config, drain: &CancellationToken) {
        let info = HealthInfo::new(&self.name, &self.version);
        let router = Router::new().route(
            "/debug/status",
            get(move || {
                let info = info.clone();
                async move { Json(info) }
            }),
        );

        let addr = SocketAddr::from(([0, 0, 0, 0], config.service.debug_port));
        match TcpListener::bind(addr).await {
            Ok(listener) => {
                tracing::info!(port = config.service.debug_port, "debug server listening");
                let drain = drain.clone();
                tokio::spawn(async move {
                    let result = axum::serve(listener, router)
                        .with_graceful_shutdown(drain.cancelled_owned())
                        .await;
                    if let Err(err) = result {
                        tracing::warn!(error = %err, "debug server error");
                    }
                });
            }
            Err(err) => {
                tracing::warn!(error = %err, "debug server bind failed, continuing without it");
            }
        }
    }
}

/// Envelope-shaped 404 for routes no handler matched
async fn route_not_found() -> ApiResponse {
    let mut response = ApiResponse::error(&ApiError::field("route", "not found"));
    response.status = StatusCode::NOT_FOUND;
    response
}

/// Wait for SIGINT, SIGTERM, or SIGHUP
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(unix)]
    let hangup = async {
        signal::unix::signal(signal::unix::SignalKind::hangup())
            .expect("failed to install SIGHUP handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();
    #[cfg(not(unix))]
    let hangup = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received SIGINT, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
        _ = hangup => tracing::info!("received SIGHUP, shutting down"),
    }
}
