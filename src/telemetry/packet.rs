//! GPU telemetry datagram codec.
//!
//! One UTF-8 JSON object per datagram.  Every field is optional; unknown
//! fields are ignored and `null` counts as absent.
//!
//! ```json
//! {"gpu0_temp": 71.0, "gpu1_temp": 64.5, "gpu0_fan": 55, "gpu1_fan": 48}
//! ```

use serde::{Deserialize, Serialize};

use crate::error::TelemetryError;

/// Largest datagram the listener accepts.
pub const MAX_DATAGRAM: usize = 1024;

/// Decoded payload.  Present fields overwrite the shared sample.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryPacket {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gpu0_temp: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gpu1_temp: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gpu0_fan: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gpu1_fan: Option<f64>,
}

impl TelemetryPacket {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Decode one datagram.
pub fn decode(data: &[u8]) -> Result<TelemetryPacket, TelemetryError> {
    let text = core::str::from_utf8(data).map_err(|_| TelemetryError::NotUtf8)?;
    let value: serde_json::Value = serde_json::from_str(text).map_err(|_| TelemetryError::Json)?;
    // Structs also deserialize from arrays; only objects are valid packets.
    if !value.is_object() {
        return Err(TelemetryError::Shape);
    }
    serde_json::from_value(value).map_err(|_| TelemetryError::Shape)
}
