// Identity and product API response types
//
// Fields use `#[serde(default)]` liberally because the product API adds and
// drops fields between app releases. Everything not modelled explicitly
// lands in `extra`.

use serde::{Deserialize, Serialize};

// ── OAuth ────────────────────────────────────────────────────────────

/// Response of the password grant.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

// ── User ─────────────────────────────────────────────────────────────

/// Authenticated account from `users/me`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: u64,
    #[serde(default)]
    pub user_type: Option<String>,
    #[serde(default)]
    pub push_notifications: bool,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub mqtt_endpoint: Option<String>,
    #[serde(default)]
    pub actions_on_google_pin_code: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    /// Catch-all for undocumented fields.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

// ── Device ───────────────────────────────────────────────────────────

/// Topic pair the device listens and reports on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MqttTopics {
    /// Commands published here reach the device.
    pub command_in: String,
    /// Status reports from the device arrive here.
    pub command_out: String,
}

/// Registered product item from `product-items`.
///
/// The API returns 60+ fields per item. The ones needed to reach the
/// device over MQTT are required; the rest are optional or in `extra`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub id: u64,
    pub mqtt_endpoint: String,
    pub mqtt_topics: MqttTopics,
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default)]
    pub product_id: Option<u64>,
    #[serde(default)]
    pub user_id: Option<u64>,
    #[serde(default)]
    pub serial_number: Option<String>,
    #[serde(default)]
    pub mac_address: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub firmware_version: Option<String>,
    #[serde(default)]
    pub online: bool,
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub protocol: Option<i64>,
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub time_zone: Option<String>,
    #[serde(default)]
    pub lawn_size: Option<f64>,
    #[serde(default)]
    pub mower_work_time: Option<u64>,
    #[serde(default)]
    pub blade_work_time: Option<u64>,
    #[serde(default)]
    pub distance_covered: Option<u64>,
    #[serde(default)]
    pub battery_charge_cycles: Option<u64>,
    #[serde(default)]
    pub registered_at: Option<String>,
    /// Catch-all for undocumented fields.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl DeviceRecord {
    /// Name to show in output; falls back to the serial number.
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .or(self.serial_number.as_deref())
            .unwrap_or("(unnamed)")
    }
}
