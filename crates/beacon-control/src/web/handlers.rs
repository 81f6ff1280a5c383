//! HTTP request handlers

use axum::http::Method;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::warning::WarningControl;

/// Body of every control surface response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ApiResponse {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connected: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intensity: Option<f32>,
}

impl ApiResponse {
    pub fn success(message: &str) -> Self {
        Self {
            success: true,
            message: message.to_string(),
            connected: None,
            active: None,
            intensity: None,
        }
    }

    pub fn failure(message: &str) -> Self {
        Self {
            success: false,
            ..Self::success(message)
        }
    }
}

/// Route a request by method and path suffix
pub fn handle_request(control: &dyn WarningControl, method: &Method, path: &str) -> ApiResponse {
    info!("{} {}", method, path);

    if *method != Method::GET {
        return ApiResponse::failure("Only GET methods are currently supported.");
    }

    if path.ends_with("/start") {
        start(control)
    } else if path.ends_with("/stop") {
        stop(control)
    } else if path.ends_with("/status") {
        status(control)
    } else {
        ApiResponse::failure("Unknown endpoint.")
    }
}

/// `GET …/start`
pub fn start(control: &dyn WarningControl) -> ApiResponse {
    control.activate_warning();
    ApiResponse::success("Started.")
}

/// `GET …/stop`
pub fn stop(control: &dyn WarningControl) -> ApiResponse {
    control.deactivate_warning();
    ApiResponse::success("Stopped.")
}

/// `GET …/status`
pub fn status(control: &dyn WarningControl) -> ApiResponse {
    let connected = control.query_connection_status();
    let message = if connected { "Connected." } else { "Searching." };

    ApiResponse {
        connected: Some(connected),
        active: Some(control.is_warning_active()),
        intensity: Some(control.intensity()),
        ..ApiResponse::success(message)
    }
}
