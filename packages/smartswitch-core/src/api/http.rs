//! HTTP route handlers.
//!
//! All handlers are thin - they render WeMo documents and delegate state
//! changes to the [`Switch`](crate::switch::Switch).

use axum::{
    body::Body,
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::api::AppState;
use crate::protocol_constants::{CONTROL_PATH, HTTP_TIMEOUT, MAX_CONTROL_BODY_SIZE, SETUP_PATH};
use crate::switch::{SwitchError, SwitchResult};
use crate::wemo::{build_binary_state_response, build_setup_xml, parse_control_request, ControlAction};

const XML_CONTENT_TYPE: &str = "text/xml";

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Failures while serving a control request.
#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    /// The request body could not be read.
    #[error("could not read request body: {0}")]
    Body(String),

    /// The switch rejected the query or the change.
    #[error("switch failed: {0}")]
    Switch(#[from] SwitchError),

    /// The blocking switch call panicked.
    #[error("switch task failed: {0}")]
    Task(String),
}

impl ControlError {
    /// Maps the error to an appropriate HTTP status code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Body(_) => StatusCode::BAD_REQUEST,
            Self::Switch(_) | Self::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ControlError {
    fn into_response(self) -> Response {
        log::warn!("[Wemo] Control request failed: {}", self);
        self.status_code().into_response()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Router
// ─────────────────────────────────────────────────────────────────────────────

/// Creates the Axum router with the emulation routes under the state's prefix.
pub fn create_router(state: AppState) -> Router {
    let setup = format!("{}{}", state.prefix, SETUP_PATH);
    let control = format!("{}{}", state.prefix, CONTROL_PATH);

    Router::new()
        .route(&setup, get(serve_setup))
        .route(&control, post(handle_control))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            HTTP_TIMEOUT,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// Serves the UPnP device description.
async fn serve_setup(State(state): State<AppState>) -> impl IntoResponse {
    log::debug!("[Wemo] Description requested");
    (
        [(header::CONTENT_TYPE, XML_CONTENT_TYPE)],
        build_setup_xml(&state.device),
    )
}

/// Handles `GetBinaryState` / `SetBinaryState` SOAP actions.
async fn handle_control(
    State(state): State<AppState>,
    body: Body,
) -> Result<Response, ControlError> {
    let body_bytes = axum::body::to_bytes(body, MAX_CONTROL_BODY_SIZE)
        .await
        .map_err(|e| ControlError::Body(e.to_string()))?;

    let action = parse_control_request(&String::from_utf8_lossy(&body_bytes));
    log::debug!("[Wemo] Control request: {:?}", action);

    let switch = state.switch.clone();
    let current = tokio::task::spawn_blocking(move || -> SwitchResult<bool> {
        if let ControlAction::Set(on) = action {
            switch.set(on)?;
        }
        switch.status()
    })
    .await
    .map_err(|e| ControlError::Task(e.to_string()))??;

    Ok((
        [(header::CONTENT_TYPE, XML_CONTENT_TYPE)],
        build_binary_state_response(action, current),
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    use axum::http::Request;
    use tower::ServiceExt;

    use crate::switch::Switch;
    use crate::wemo::DeviceInfo;

    #[derive(Default)]
    struct CountingSwitch {
        on: AtomicBool,
        set_calls: AtomicUsize,
        last_set: AtomicBool,
        status_calls: AtomicUsize,
        fail_status: bool,
        fail_set: bool,
        stall: Option<std::time::Duration>,
    }

    impl Switch for CountingSwitch {
        fn status(&self) -> SwitchResult<bool> {
            self.status_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(stall) = self.stall {
                std::thread::sleep(stall);
            }
            if self.fail_status {
                return Err(SwitchError::new("sensor offline"));
            }
            Ok(self.on.load(Ordering::SeqCst))
        }

        fn set(&self, on: bool) -> SwitchResult<()> {
            self.set_calls.fetch_add(1, Ordering::SeqCst);
            self.last_set.store(on, Ordering::SeqCst);
            if self.fail_set {
                return Err(SwitchError::new("motor jammed"));
            }
            self.on.store(on, Ordering::SeqCst);
            Ok(())
        }
    }

    fn state_with(switch: Arc<CountingSwitch>, prefix: &str) -> AppState {
        let device = DeviceInfo {
            friendly_name: "garage".to_string(),
            uuid: "1234".to_string(),
            serial: "SERIAL01".to_string(),
            control_url: format!("{}{}", prefix, CONTROL_PATH),
            event_url: format!("{}/upnp/event/basicevent1", prefix),
        };
        AppState::new(switch, device, prefix)
    }

    fn soap(action: &str, inner: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="utf-8"?><s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/"><s:Body><u:{action} xmlns:u="urn:Belkin:service:basicevent:1">{inner}</u:{action}></s:Body></s:Envelope>"#
        )
    }

    async fn post_control(router: Router, path: &str, body: String) -> (StatusCode, String) {
        let response = router
            .oneshot(
                Request::post(path)
                    .header(header::CONTENT_TYPE, "text/xml")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn set_request_turns_switch_on_once() {
        let switch = Arc::new(CountingSwitch::default());
        let router = create_router(state_with(switch.clone(), ""));

        let (status, body) = post_control(
            router,
            CONTROL_PATH,
            soap("SetBinaryState", "<BinaryState>1</BinaryState>"),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(switch.set_calls.load(Ordering::SeqCst), 1);
        assert!(switch.last_set.load(Ordering::SeqCst));
        assert!(body.contains("SetBinaryStateResponse"));
        assert!(body.contains("<BinaryState>1</BinaryState>"));
    }

    #[tokio::test]
    async fn set_request_with_zero_turns_switch_off() {
        let switch = Arc::new(CountingSwitch::default());
        switch.on.store(true, Ordering::SeqCst);
        let router = create_router(state_with(switch.clone(), ""));

        let (_, body) = post_control(
            router,
            CONTROL_PATH,
            soap("SetBinaryState", "<BinaryState>0</BinaryState>"),
        )
        .await;

        assert_eq!(switch.set_calls.load(Ordering::SeqCst), 1);
        assert!(!switch.last_set.load(Ordering::SeqCst));
        assert!(body.contains("<BinaryState>0</BinaryState>"));
    }

    #[tokio::test]
    async fn get_request_reports_state_without_setting() {
        let switch = Arc::new(CountingSwitch::default());
        switch.on.store(true, Ordering::SeqCst);
        let router = create_router(state_with(switch.clone(), ""));

        let (status, body) =
            post_control(router, CONTROL_PATH, soap("GetBinaryState", "")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(switch.set_calls.load(Ordering::SeqCst), 0);
        assert_eq!(switch.status_calls.load(Ordering::SeqCst), 1);
        assert!(body.contains("GetBinaryStateResponse"));
        assert!(!body.contains("SetBinaryStateResponse"));
        assert!(body.contains("<BinaryState>1</BinaryState>"));
    }

    #[tokio::test]
    async fn status_failure_is_internal_error() {
        let switch = Arc::new(CountingSwitch {
            fail_status: true,
            ..Default::default()
        });
        let router = create_router(state_with(switch, ""));

        let (status, _) = post_control(router, CONTROL_PATH, soap("GetBinaryState", "")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn set_failure_is_internal_error() {
        let switch = Arc::new(CountingSwitch {
            fail_set: true,
            ..Default::default()
        });
        let router = create_router(state_with(switch.clone(), ""));

        let (status, _) = post_control(
            router,
            CONTROL_PATH,
            soap("SetBinaryState", "<BinaryState>1</BinaryState>"),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(switch.set_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn oversized_body_is_bad_request() {
        let switch = Arc::new(CountingSwitch::default());
        let router = create_router(state_with(switch.clone(), ""));

        let body = "x".repeat(MAX_CONTROL_BODY_SIZE + 1);
        let (status, _) = post_control(router, CONTROL_PATH, body).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(switch.status_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_switch_times_out() {
        let switch = Arc::new(CountingSwitch {
            stall: Some(std::time::Duration::from_millis(200)),
            ..Default::default()
        });
        let router = create_router(state_with(switch, ""));

        let (status, _) = post_control(router, CONTROL_PATH, soap("GetBinaryState", "")).await;

        assert_eq!(status, StatusCode::REQUEST_TIMEOUT);
    }

    #[tokio::test]
    async fn routes_respect_prefix() {
        let switch = Arc::new(CountingSwitch::default());
        let router = create_router(state_with(switch, "/porch"));

        let response = router
            .clone()
            .oneshot(Request::get("/porch/setup.xml").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/xml"
        );
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let xml = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(xml.contains("<friendlyName>garage</friendlyName>"));
        assert!(xml.contains("<controlURL>/porch/upnp/control/basicevent1</controlURL>"));

        let response = router
            .oneshot(Request::get("/setup.xml").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
