use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::adb::{self, DeviceInfo};

use super::error::AppError;
use super::AppState;

/// Request body naming a device by IP address.
#[derive(Debug, Deserialize)]
pub struct DeviceRequest {
    pub ip: String,
}

#[derive(Debug, Serialize)]
pub struct HandshakeResponse {
    pub ok: bool,
    pub message: String,
    /// Number of collection loops stopped as part of a disconnect.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stopped: Option<usize>,
}

/// POST /api/v1/devices/connect — establish the adb TCP handshake.
pub async fn connect(
    State(state): State<AppState>,
    Json(req): Json<DeviceRequest>,
) -> Result<Json<HandshakeResponse>, AppError> {
    let (ok, message) = adb::connect(state.runner.as_ref(), req.ip.trim()).await?;
    Ok(Json(HandshakeResponse {
        ok,
        message,
        stopped: None,
    }))
}

/// POST /api/v1/devices/disconnect — stop every collection for the device,
/// then drop the adb connection.
pub async fn disconnect(
    State(state): State<AppState>,
    Json(req): Json<DeviceRequest>,
) -> Result<Json<HandshakeResponse>, AppError> {
    let ip = req.ip.trim();
    if !adb::is_valid_device(ip) {
        return Err(AppError::Validation(format!("invalid device address: {ip}")));
    }

    let stopped = state.hub.stop_all(ip).await;
    let (ok, message) = adb::disconnect(state.runner.as_ref(), ip).await?;
    Ok(Json(HandshakeResponse {
        ok,
        message,
        stopped: Some(stopped),
    }))
}

/// GET /api/v1/devices/:ip/info — product name and OS version.
pub async fn info(
    State(state): State<AppState>,
    Path(ip): Path<String>,
) -> Result<Json<DeviceInfo>, AppError> {
    let info = adb::device_info(state.runner.as_ref(), &ip).await?;
    Ok(Json(info))
}
