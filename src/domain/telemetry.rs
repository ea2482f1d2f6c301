//! Telemetry records reported by the DTU.
//!
//! [`TelemetryFields`] is the partial shape of one inbound message: every
//! field is optional at every level. [`TelemetrySnapshot`] is the merged
//! view. Merging is field by field, so a message carrying only
//! `total.Power` leaves `total.YieldDay` and every status block untouched.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::TelemetryParseError;

/// Field-wise merge where `Some` values in `other` win.
pub trait Merge {
    /// Merges `other` into `self`. Fields absent from `other` keep their
    /// current value.
    fn merge(&mut self, other: Self);
}

impl<T: Merge> Merge for Option<T> {
    fn merge(&mut self, other: Self) {
        match (self.as_mut(), other) {
            (Some(current), Some(next)) => current.merge(next),
            (None, Some(next)) => *self = Some(next),
            (_, None) => {}
        }
    }
}

/// Implements [`Merge`] for a struct whose fields are all `Option` leaves.
macro_rules! merge_leaves {
    ($ty:ty { $($field:ident),+ $(,)? }) => {
        impl Merge for $ty {
            fn merge(&mut self, other: Self) {
                $(
                    if other.$field.is_some() {
                        self.$field = other.$field;
                    }
                )+
            }
        }
    };
}

/// A measured value as the DTU reports it: value, unit, display decimals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct StatusValue {
    /// Numeric value.
    pub v: f64,
    /// Unit (`"W"`, `"kWh"`...).
    #[serde(default)]
    pub u: String,
    /// Number of decimals to display.
    #[serde(default)]
    pub d: u8,
}

impl StatusValue {
    /// Creates a value with the given unit and zero display decimals.
    #[must_use]
    pub fn new(v: f64, unit: &str) -> Self {
        Self {
            v,
            u: unit.to_string(),
            d: 0,
        }
    }
}

/// Aggregated power and yield across all inverters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TotalStats {
    /// Current AC power.
    #[serde(rename = "Power", default, skip_serializing_if = "Option::is_none")]
    pub power: Option<StatusValue>,
    /// Energy produced today.
    #[serde(rename = "YieldDay", default, skip_serializing_if = "Option::is_none")]
    pub yield_day: Option<StatusValue>,
    /// Energy produced over the lifetime of the installation.
    #[serde(rename = "YieldTotal", default, skip_serializing_if = "Option::is_none")]
    pub yield_total: Option<StatusValue>,
}

merge_leaves!(TotalStats {
    power,
    yield_day,
    yield_total
});

/// System information of the DTU itself.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct SystemStatus {
    /// Installed firmware identifier (release tag or commit hash).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git_hash: Option<String>,
    /// Whether `git_hash` is a bare commit hash rather than a tag.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git_is_hash: Option<bool>,
    /// Device hostname.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    /// Seconds since boot.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uptime: Option<u64>,
    /// ESP-IDF SDK version.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sdkversion: Option<String>,
    /// PlatformIO build environment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pioenv: Option<String>,
    /// Chip model string.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chipmodel: Option<String>,
    /// Total heap in bytes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heap_total: Option<u64>,
    /// Used heap in bytes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heap_used: Option<u64>,
    /// Configuration file version.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_version: Option<String>,
}

merge_leaves!(SystemStatus {
    git_hash,
    git_is_hash,
    hostname,
    uptime,
    sdkversion,
    pioenv,
    chipmodel,
    heap_total,
    heap_used,
    config_version,
});

/// Wi-Fi station / access point state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct NetworkStatus {
    /// Station connected.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sta_status: Option<bool>,
    /// Station SSID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sta_ssid: Option<String>,
    /// Station signal strength in dBm.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sta_rssi: Option<i32>,
    /// Hostname on the network.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_hostname: Option<String>,
    /// IPv4 address.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_ip: Option<String>,
    /// MAC address.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_mac: Option<String>,
    /// Interface in use (`"WiFi"` / `"Ethernet"`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_mode: Option<String>,
    /// Access point enabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ap_status: Option<bool>,
    /// Number of stations on the access point.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ap_stationnum: Option<u32>,
}

merge_leaves!(NetworkStatus {
    sta_status,
    sta_ssid,
    sta_rssi,
    network_hostname,
    network_ip,
    network_mac,
    network_mode,
    ap_status,
    ap_stationnum,
});

/// Time synchronisation state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct NtpStatus {
    /// Configured NTP server.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ntp_server: Option<String>,
    /// POSIX timezone string.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ntp_timezone: Option<String>,
    /// Synchronised with the server.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ntp_status: Option<bool>,
    /// Local time as rendered by the device.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ntp_localtime: Option<String>,
    /// Sunrise time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sun_risetime: Option<String>,
    /// Sunset time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sun_settime: Option<String>,
}

merge_leaves!(NtpStatus {
    ntp_server,
    ntp_timezone,
    ntp_status,
    ntp_localtime,
    sun_risetime,
    sun_settime,
});

/// MQTT publisher state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct MqttStatus {
    /// Publisher enabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mqtt_enabled: Option<bool>,
    /// Broker hostname.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mqtt_hostname: Option<String>,
    /// Broker port.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mqtt_port: Option<u16>,
    /// Connected to the broker.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mqtt_connected: Option<bool>,
    /// Base topic.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mqtt_topic: Option<String>,
    /// TLS in use.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mqtt_tls: Option<bool>,
    /// Home Assistant discovery enabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mqtt_hass_enabled: Option<bool>,
}

merge_leaves!(MqttStatus {
    mqtt_enabled,
    mqtt_hostname,
    mqtt_port,
    mqtt_connected,
    mqtt_topic,
    mqtt_tls,
    mqtt_hass_enabled,
});

/// One inbound device message. Unknown keys (per-inverter data, hints...)
/// are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct TelemetryFields {
    /// Aggregated totals.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<TotalStats>,
    /// DTU system information.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_status: Option<SystemStatus>,
    /// Network information.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_status: Option<NetworkStatus>,
    /// NTP information.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ntp_status: Option<NtpStatus>,
    /// MQTT information.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mqtt_status: Option<MqttStatus>,
}

impl TelemetryFields {
    /// Decodes one raw device message.
    ///
    /// # Errors
    ///
    /// Returns [`TelemetryParseError`] if `raw` is not a JSON object or a
    /// known field has the wrong shape.
    pub fn parse(raw: &str) -> Result<Self, TelemetryParseError> {
        let value: serde_json::Value = serde_json::from_str(raw)?;
        if !value.is_object() {
            return Err(TelemetryParseError::NotAnObject);
        }
        Ok(serde_json::from_value(value)?)
    }

    /// Returns `true` if the message carries no known field.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.total.is_none()
            && self.system_status.is_none()
            && self.network_status.is_none()
            && self.ntp_status.is_none()
            && self.mqtt_status.is_none()
    }
}

impl Merge for TelemetryFields {
    fn merge(&mut self, other: Self) {
        self.total.merge(other.total);
        self.system_status.merge(other.system_status);
        self.network_status.merge(other.network_status);
        self.ntp_status.merge(other.ntp_status);
        self.mqtt_status.merge(other.mqtt_status);
    }
}

/// The merged, most recent view of the device.
#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TelemetrySnapshot {
    /// Aggregated totals; individual values stay `None` until reported.
    pub total: TotalStats,
    /// DTU system information, once reported.
    pub system_status: Option<SystemStatus>,
    /// Network information, once reported.
    pub network_status: Option<NetworkStatus>,
    /// NTP information, once reported.
    pub ntp_status: Option<NtpStatus>,
    /// MQTT information, once reported.
    pub mqtt_status: Option<MqttStatus>,
}

impl TelemetrySnapshot {
    /// Merges an inbound message into the snapshot.
    pub fn apply(&mut self, fields: TelemetryFields) {
        if let Some(total) = fields.total {
            self.total.merge(total);
        }
        self.system_status.merge(fields.system_status);
        self.network_status.merge(fields.network_status);
        self.ntp_status.merge(fields.ntp_status);
        self.mqtt_status.merge(fields.mqtt_status);
    }

    /// Installed firmware identifier, if the DTU reported one.
    #[must_use]
    pub fn installed_firmware(&self) -> Option<&str> {
        self.system_status
            .as_ref()
            .and_then(|status| status.git_hash.as_deref())
    }
}

impl From<TelemetryFields> for TelemetrySnapshot {
    fn from(fields: TelemetryFields) -> Self {
        let mut snapshot = Self::default();
        snapshot.apply(fields);
        snapshot
    }
}
