use serde::{Deserialize, Serialize};

/// A television found by a discovery scan
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiscoveredDevice {
    /// Host address extracted from the descriptor location
    pub host: String,
    /// Port the descriptor was served from
    pub port: u16,
    /// Human-readable device name
    pub friendly_name: String,
    pub manufacturer: String,
    /// Unique device identifier (UDN)
    pub id: String,
}

/// One named entry of the device's remote-controller code table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandCode {
    pub name: String,
    pub value: String,
}

/// Interface description returned by `getInterfaceInformation`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterfaceInformation {
    pub model_name: String,
    pub product_name: String,
    pub interface_version: String,
    #[serde(default)]
    pub product_category: Option<String>,
    #[serde(default)]
    pub server_name: Option<String>,
}

/// Result of a playing-content query
///
/// The device reports "display is off" and similar conditions through its
/// error envelope; those resolve to `Unavailable` with the reported message.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackInfo {
    /// Currently playing content
    Content(PlayingContentInfo),
    /// No content information; the device reported a status message instead
    Unavailable(String),
}

/// Currently playing content as reported by `getPlayingContentInfo`
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlayingContentInfo {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    /// Channel display number, where applicable
    #[serde(default)]
    pub disp_num: Option<String>,
    #[serde(default)]
    pub program_title: Option<String>,
    #[serde(default)]
    pub start_date_time: Option<String>,
    #[serde(default)]
    pub duration_sec: Option<i64>,
}

/// An installed application
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AppInfo {
    pub title: String,
    pub uri: String,
    #[serde(default)]
    pub icon: Option<String>,
}

/// One entry of a content listing
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContentItem {
    pub uri: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub index: Option<i64>,
    #[serde(default)]
    pub disp_num: Option<String>,
    #[serde(default)]
    pub program_media_type: Option<String>,
}

/// Volume state for one audio target (speaker, headphone, ...)
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VolumeInformation {
    pub target: String,
    pub volume: i32,
    pub mute: bool,
    #[serde(default)]
    pub max_volume: Option<i32>,
    #[serde(default)]
    pub min_volume: Option<i32>,
}
