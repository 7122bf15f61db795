//! HTTP surface.
//!
//! Every failure is answered with a JSON body and a generic localized
//! message; internal error detail only goes to the log.

use crate::mail::Mailer;
use abl_partida::{Coordinate, NotificationComposer, RecordResolver, Renderer};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

pub const MSG_EMAIL_SENT: &str = "Email enviado con éxito";
pub const MSG_NO_DATA: &str = "No se pudo obtener la información de la partida.";
pub const MSG_PROCESSING_FAILED: &str = "Error procesando la solicitud";
pub const MSG_VERIFICATION_FAILED: &str = "Error verificando la existencia de la partida";

/// Shared state passed to handlers.
pub struct AppState {
    renderer: Arc<dyn Renderer>,
    resolver: RecordResolver,
    composer: NotificationComposer,
    mailer: Arc<dyn Mailer>,
}

impl AppState {
    pub fn new(
        renderer: Arc<dyn Renderer>,
        resolver: RecordResolver,
        composer: NotificationComposer,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        Self {
            renderer,
            resolver,
            composer,
            mailer,
        }
    }
}

#[derive(Debug, Deserialize)]
struct VerificationRequest {
    lat: f64,
    lng: f64,
}

#[derive(Debug, Deserialize)]
struct FetchDataRequest {
    lat: f64,
    lng: f64,
    email: String,
}

/// Build the axum Router with all endpoints. `request_timeout` bounds each
/// request as a whole, across however many navigations it needs.
pub fn router(state: Arc<AppState>, request_timeout: Duration) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/verification", post(handle_verification))
        .route("/fetch-abl-data", post(handle_fetch_abl_data))
        .layer(TimeoutLayer::new(request_timeout))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve `app` on `listener` until `shutdown` resolves. In-flight requests
/// are allowed to finish.
pub async fn serve(
    listener: TcpListener,
    app: Router,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!("Server running on http://{addr}");
    }
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}

// ── Handlers ────────────────────────────────────────────────────

async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "active_contexts": state.renderer.active_contexts(),
    }))
}

async fn handle_verification(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<VerificationRequest>, JsonRejection>,
) -> Response {
    let Json(req) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            warn!("rejected verification request: {rejection}");
            return verification_error();
        }
    };

    match state.resolver.verify(Coordinate::new(req.lat, req.lng)).await {
        Ok(outcome) => Json(outcome).into_response(),
        Err(e) => {
            error!(lat = req.lat, lng = req.lng, "error verifying property: {e}");
            verification_error()
        }
    }
}

async fn handle_fetch_abl_data(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<FetchDataRequest>, JsonRejection>,
) -> Response {
    let Json(req) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            warn!("rejected fetch-abl-data request: {rejection}");
            return processing_error(MSG_PROCESSING_FAILED);
        }
    };

    let data = match state.resolver.fetch_data(Coordinate::new(req.lat, req.lng)).await {
        Ok(Some(data)) => data,
        Ok(None) => {
            info!(lat = req.lat, lng = req.lng, "no tax record found");
            return processing_error(MSG_NO_DATA);
        }
        Err(e) => {
            error!(lat = req.lat, lng = req.lng, "error fetching ABL data: {e}");
            return processing_error(MSG_PROCESSING_FAILED);
        }
    };

    let message = state.composer.compose(&data);
    if let Err(e) = state.mailer.send(&req.email, &message).await {
        error!(lat = req.lat, lng = req.lng, "failed to deliver notification: {e}");
        return processing_error(MSG_PROCESSING_FAILED);
    }

    Json(json!({ "message": MSG_EMAIL_SENT, "result": data })).into_response()
}

// ── Helpers ─────────────────────────────────────────────────────

fn processing_error(message: &str) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": message })),
    )
        .into_response()
}

fn verification_error() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "status": "error", "message": MSG_VERIFICATION_FAILED })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_bodies_deserialize() {
        let req: FetchDataRequest =
            serde_json::from_str(r#"{"lat": -34.6, "lng": -58.4, "email": "a@b.test"}"#).unwrap();
        assert_eq!(req.email, "a@b.test");
        assert!(serde_json::from_str::<VerificationRequest>(r#"{"lat": -34.6}"#).is_err());
    }
}
