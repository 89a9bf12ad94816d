//! HTTP endpoints
//!
//! Carrier-facing surface. The voice webhook must answer inside the
//! carrier's sub-second timeout, so it does no I/O: admission runs over
//! an in-memory snapshot and the response is plain TwiML. Any handler
//! panic short of the webhook layer still yields the emergency document
//! via the outer catch in `voice_webhook`.

use axum::{
    extract::{
        ws::WebSocketUpgrade,
        Form, State,
    },
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::Utc;
use serde::Deserialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use receptionist_relay::run_call;

use crate::entry::{route_call, InboundCall};
use crate::state::AppState;
use crate::twiml::EMERGENCY_TWIML;

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/twilio/voice", post(voice_webhook))
        .route("/twilio/fallback", post(fallback_webhook))
        .route("/twilio/stream", get(stream_handler))
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

fn xml_response(body: String) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/xml")],
        body,
    )
        .into_response()
}

/// Carrier webhook form fields (only the ones we read)
#[derive(Debug, Deserialize)]
struct VoiceForm {
    #[serde(rename = "CallSid")]
    call_sid: Option<String>,
    #[serde(rename = "From")]
    from: Option<String>,
    #[serde(rename = "To")]
    to: Option<String>,
}

/// Inbound call entry point. Always returns 200 with valid TwiML; a
/// broken response here aborts the call setup entirely.
async fn voice_webhook(State(state): State<AppState>, form: Option<Form<VoiceForm>>) -> Response {
    let Some(Form(form)) = form else {
        tracing::error!("Voice webhook with unparseable form, returning emergency TwiML");
        return xml_response(EMERGENCY_TWIML.to_string());
    };

    let call = InboundCall {
        call_sid: form.call_sid.unwrap_or_default(),
        from_number: form.from.unwrap_or_default(),
        to_number: form.to.unwrap_or_default(),
        received_at: Utc::now(),
    };

    let business = state.business.snapshot();
    let directive = route_call(
        &call,
        state.config.admission.kill_switch_global,
        &business,
        &state.config.stream_url(),
    );
    xml_response(directive.to_twiml())
}

/// Emergency fallback the carrier hits when the voice webhook errors.
async fn fallback_webhook() -> Response {
    tracing::error!("Carrier invoked the fallback webhook");
    xml_response(EMERGENCY_TWIML.to_string())
}

/// Media stream websocket. One relay task per connection, bounded by
/// `server.max_concurrent_calls`; excess streams are refused before the
/// upgrade so the carrier fails over instead of queueing.
async fn stream_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    let Ok(permit) = state.call_permits.clone().try_acquire_owned() else {
        tracing::warn!(
            limit = state.config.server.max_concurrent_calls,
            "Concurrent call limit reached, refusing media stream"
        );
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    };
    ws.on_upgrade(move |socket| async move {
        let _permit = permit;
        let ctx = state.relay_context();
        if let Err(e) = run_call(socket, ctx).await {
            tracing::error!(error = %e, "Relay task failed");
        }
    })
}

async fn health_check() -> impl IntoResponse {
    axum::Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn readiness_check(State(state): State<AppState>) -> Response {
    // Ready once the business config is readable and valid.
    let business = state.business.snapshot();
    match business.validate() {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    async fn body_string(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn voice_request(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/twilio/voice")
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_voice_webhook_denies_disabled_receptionist() {
        let app = create_router(AppState::for_tests());
        let response = app
            .oneshot(voice_request("CallSid=CA1&From=%2B15550001111&To=%2B15550002222"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_string(response).await;
        assert!(body.contains("<Hangup/>"));
    }

    #[tokio::test]
    async fn test_voice_webhook_connects_enabled_receptionist() {
        let state = AppState::for_tests();
        state
            .business
            .update(|cfg| {
                cfg.phone_number = Some("+15550002222".to_string());
                cfg.receptionist_enabled = true;
            })
            .unwrap();

        let app = create_router(state);
        let response = app
            .oneshot(voice_request("CallSid=CA1&From=%2B15550001111&To=%2B15550002222"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_string(response).await;
        assert!(body.contains("<Connect>"));
        assert!(body.contains("/twilio/stream"));
    }

    #[tokio::test]
    async fn test_kill_switch_denies_every_call() {
        let mut settings = receptionist_config::Settings::default();
        settings.admission.kill_switch_global = true;

        let state = AppState::for_tests();
        let state = AppState {
            config: std::sync::Arc::new(settings),
            ..state
        };
        state
            .business
            .update(|cfg| {
                cfg.phone_number = Some("+15550002222".to_string());
                cfg.receptionist_enabled = true;
            })
            .unwrap();

        let app = create_router(state);
        let response = app
            .oneshot(voice_request("CallSid=CA1&From=%2B15550001111"))
            .await
            .unwrap();
        let body = body_string(response).await;
        assert!(body.contains("<Hangup/>"));
    }

    #[tokio::test]
    async fn test_garbage_form_still_returns_twiml() {
        let app = create_router(AppState::for_tests());
        let request = Request::builder()
            .method("POST")
            .uri("/twilio/voice")
            .header("content-type", "application/json")
            .body(Body::from("{\"not\":\"a form\"}"))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_string(response).await;
        assert!(body.contains("<Response>"));
    }

    #[tokio::test]
    async fn test_fallback_returns_emergency_twiml() {
        let app = create_router(AppState::for_tests());
        let request = Request::builder()
            .method("POST")
            .uri("/twilio/fallback")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_string(response).await;
        assert!(body.contains("technical difficulties"));
    }

    fn stream_request() -> Request<Body> {
        Request::builder()
            .uri("/twilio/stream")
            .header("connection", "upgrade")
            .header("upgrade", "websocket")
            .header("sec-websocket-version", "13")
            .header("sec-websocket-key", "dGhlIHNhbXBsZSBub25jZQ==")
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_stream_upgrade_within_call_limit() {
        let app = create_router(AppState::for_tests());
        let response = app.oneshot(stream_request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::SWITCHING_PROTOCOLS);
    }

    #[tokio::test]
    async fn test_stream_refused_over_call_limit() {
        let mut settings = receptionist_config::Settings::default();
        settings.server.max_concurrent_calls = 0;
        let business = receptionist_store::BusinessStore::new(
            receptionist_core::BusinessConfig::default(),
        )
        .unwrap();
        let state = AppState::new(
            settings,
            std::sync::Arc::new(business),
            std::sync::Arc::new(receptionist_store::MemoryFrameStore::new()),
            None,
        );

        let app = create_router(state);
        let response = app.oneshot(stream_request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_health_endpoints() {
        let app = create_router(AppState::for_tests());
        let health = app
            .clone()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(health.status(), StatusCode::OK);

        let ready = app
            .oneshot(Request::builder().uri("/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(ready.status(), StatusCode::OK);
    }
}
