use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use super::middleware::PrincipalLayer;
use super::sparql_controller::SparqlController;
use crate::context::Context;

/// Maximum request body size in bytes (10 MB)
const MAX_BODY_SIZE: usize = 10 * 1024 * 1024;

/// Build the gateway router with its middleware stack.
pub fn build_router(context: Arc<Context>) -> Router {
    let public_endpoint_enabled = context.config().http_api.public_endpoint_enabled;

    let mut router = Router::new().route(
        "/sparql",
        get(SparqlController::handle_request).post(SparqlController::handle_request),
    );

    if public_endpoint_enabled {
        router = router.route(
            "/public/sparql",
            get(SparqlController::handle_public_request)
                .post(SparqlController::handle_public_request),
        );
    }

    // Layer order (bottom-to-top, last added runs first):
    // 1. Principal resolution (innermost)
    // 2. Body size limit
    // 3. Request tracing
    // 4. CORS (outermost)
    router
        .with_state(context)
        .layer(PrincipalLayer)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_SIZE))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

pub struct HttpApiRouter {
    port: u16,
    router: Router,
}

impl HttpApiRouter {
    pub fn new(context: &Arc<Context>) -> Self {
        let port = context.config().http_api.port;
        Self {
            port,
            router: build_router(Arc::clone(context)),
        }
    }

    pub async fn listen_and_handle_http_requests(self, shutdown: oneshot::Receiver<()>) {
        let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.port));

        let listener = TcpListener::bind(addr)
            .await
            .expect("Failed to bind HTTP listener");
        tracing::info!(port = self.port, "HTTP API listening");

        if let Err(e) = axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.await;
            })
            .await
        {
            tracing::error!(error = %e, "HTTP server failed");
        }
    }
}
