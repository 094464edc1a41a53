use crate::codes::{is_literal_code, CommandTable};
use crate::error::{BraviaError, Result};
use crate::protocol::Service;
use crate::transport::Transport;
use crate::types::{
    AppInfo, CommandCode, ContentItem, InterfaceInformation, PlaybackInfo, PlayingContentInfo,
    VolumeInformation,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::sleep;

const DEFAULT_PORT: u16 = 80;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_COMMAND_INTERVAL: Duration = Duration::from_millis(350);

/// Client for controlling a BRAVIA television
///
/// The `BraviaClient` holds the television's connection coordinates and two
/// per-instance caches: the remote-controller code table and the per-namespace
/// API version tables. Both are fetched from the device on first use and kept
/// for the lifetime of the client. Each client owns independent caches, so
/// multiple televisions can be controlled concurrently from one process.
pub struct BraviaClient {
    transport: Transport,
    command_interval: Duration,
    command_table: Mutex<Option<CommandTable>>,
    api_versions: Mutex<HashMap<Service, HashMap<String, Vec<String>>>>,
}

/// Builder for [`BraviaClient`]
pub struct BraviaClientBuilder {
    host: String,
    psk: String,
    port: u16,
    timeout: Duration,
    command_interval: Duration,
}

impl BraviaClientBuilder {
    /// Override the control API port (default 80)
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Override the per-request network timeout (default 10 seconds)
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Override the pause between consecutive commands (default 350 ms)
    pub fn command_interval(mut self, interval: Duration) -> Self {
        self.command_interval = interval;
        self
    }

    pub fn build(self) -> Result<BraviaClient> {
        let transport = Transport::new(&self.host, self.port, self.psk, self.timeout)?;

        Ok(BraviaClient {
            transport,
            command_interval: self.command_interval,
            command_table: Mutex::new(None),
            api_versions: Mutex::new(HashMap::new()),
        })
    }
}

impl BraviaClient {
    /// Create a client for the television at the given host
    ///
    /// The pre-shared key is the one configured on the television under
    /// network-control authentication; it is attached to every request.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use bravia_control::BraviaClient;
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     let tv = BraviaClient::new("192.168.1.42", "0000")?;
    ///     tv.set_power_state(true).await?;
    ///     tv.send_command("VolumeUp").await?;
    ///     Ok(())
    /// }
    /// ```
    pub fn new(host: impl Into<String>, psk: impl Into<String>) -> Result<Self> {
        Self::builder(host, psk).build()
    }

    /// Start building a client with non-default connection settings
    pub fn builder(host: impl Into<String>, psk: impl Into<String>) -> BraviaClientBuilder {
        BraviaClientBuilder {
            host: host.into(),
            psk: psk.into(),
            port: DEFAULT_PORT,
            timeout: DEFAULT_TIMEOUT,
            command_interval: DEFAULT_COMMAND_INTERVAL,
        }
    }

    // ========== Remote Control Commands ==========

    /// Resolve a command name or literal code to an IRCC control code
    ///
    /// Literal codes pass through untouched without any network traffic.
    /// Names are looked up in the device's code table, which is fetched once
    /// per client instance and reused thereafter.
    pub async fn resolve(&self, code_or_name: &str) -> Result<String> {
        if is_literal_code(code_or_name) {
            return Ok(code_or_name.to_string());
        }

        {
            let table = self.command_table.lock().await;
            if let Some(table) = table.as_ref() {
                return Self::lookup(table, code_or_name);
            }
        }

        // Populate outside the lock; a racing fetch stores the same remote
        // truth, so the last writer winning is harmless.
        let fetched = self.fetch_command_table().await?;
        let mut guard = self.command_table.lock().await;
        let table = guard.get_or_insert(fetched);
        Self::lookup(table, code_or_name)
    }

    fn lookup(table: &CommandTable, name: &str) -> Result<String> {
        table
            .lookup(name)
            .map(str::to_string)
            .ok_or_else(|| BraviaError::UnknownCommand(name.to_string()))
    }

    /// Send a single remote-control command by name or literal code
    pub async fn send_command(&self, code_or_name: &str) -> Result<()> {
        self.send_commands([code_or_name]).await
    }

    /// Send a sequence of remote-control commands
    ///
    /// Each entry is resolved and transmitted in order; the configured
    /// inter-command pause elapses fully between consecutive transmissions.
    /// The first failure aborts the sequence and is returned; remaining
    /// commands are not attempted.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use bravia_control::BraviaClient;
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// # let tv = BraviaClient::new("192.168.1.42", "0000")?;
    /// tv.send_commands(["Hdmi1", "VolumeUp", "VolumeUp"]).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn send_commands<I, S>(&self, codes_or_names: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let entries: Vec<S> = codes_or_names.into_iter().collect();
        let count = entries.len();

        for (i, entry) in entries.iter().enumerate() {
            let code = self.resolve(entry.as_ref()).await?;
            self.transport.send_ircc(&code).await?;
            if i + 1 < count {
                sleep(self.command_interval).await;
            }
        }

        Ok(())
    }

    async fn fetch_command_table(&self) -> Result<CommandTable> {
        let result = self
            .transport
            .call(Service::System, "getRemoteControllerInfo", vec![], "1.0")
            .await?;

        // The code list is the second result element, after the controller info.
        let codes_value = match result.get(1) {
            Some(value) => value.clone(),
            None => return Err(BraviaError::MalformedResponse(Value::Array(result).to_string())),
        };
        let codes: Vec<CommandCode> = serde_json::from_value(codes_value)
            .map_err(|_| BraviaError::MalformedResponse(Value::Array(result).to_string()))?;

        tracing::debug!("Fetched {} remote-controller codes", codes.len());
        Ok(CommandTable::new(codes))
    }

    // ========== API Versions ==========

    /// Resolve the protocol version to use for a method in a namespace
    ///
    /// The namespace's supported-API table is fetched on first use and cached
    /// for the lifetime of the client. A known method resolves to the last
    /// entry of its version list; an unknown method falls back to `"1.0"`.
    /// The fallback can mask a genuinely unsupported method, so a request
    /// failure at version 1.0 may mean "not supported" rather than "wrong
    /// version".
    pub async fn version_for(&self, service: Service, method: &str) -> Result<String> {
        {
            let cache = self.api_versions.lock().await;
            if let Some(table) = cache.get(&service) {
                return Ok(Self::pick_version(table, method));
            }
        }

        let fetched = self.fetch_api_info(service).await?;
        let mut cache = self.api_versions.lock().await;
        let table = cache.entry(service).or_insert(fetched);
        Ok(Self::pick_version(table, method))
    }

    fn pick_version(table: &HashMap<String, Vec<String>>, method: &str) -> String {
        table
            .get(method)
            .and_then(|versions| versions.last())
            .cloned()
            .unwrap_or_else(|| "1.0".to_string())
    }

    async fn fetch_api_info(&self, service: Service) -> Result<HashMap<String, Vec<String>>> {
        let params = vec![json!({ "services": [service.path()] })];
        let result = self
            .transport
            .call(Service::Guide, "getSupportedApiInfo", params, "1.0")
            .await?;

        let entries: Vec<ServiceApiInfo> = match result.first() {
            Some(value) => serde_json::from_value(value.clone())
                .map_err(|_| BraviaError::MalformedResponse(Value::Array(result.clone()).to_string()))?,
            None => return Err(BraviaError::MalformedResponse("[]".to_string())),
        };

        let mut table = HashMap::new();
        for entry in entries {
            for api in entry.apis {
                table.insert(
                    api.name,
                    api.versions.into_iter().map(|v| v.version).collect(),
                );
            }
        }

        tracing::debug!("Cached {} method versions for {}", table.len(), service.path());
        Ok(table)
    }

    // ========== Power ==========

    /// Query whether the television is powered on
    pub async fn get_power_state(&self) -> Result<bool> {
        let result = self
            .transport
            .call(Service::System, "getPowerStatus", vec![], "1.0")
            .await?;
        let first = take_first("getPowerStatus", result)?;
        let status: PowerStatus = serde_json::from_value(first.clone())
            .map_err(|_| BraviaError::MalformedResponse(first.to_string()))?;

        Ok(status.status == "active")
    }

    /// Power the television on or off
    pub async fn set_power_state(&self, on: bool) -> Result<()> {
        let params = vec![json!({ "status": on })];
        self.transport
            .call(Service::System, "setPowerStatus", params, "1.0")
            .await?;
        Ok(())
    }

    // ========== Device Information ==========

    /// Fetch the device's interface description
    ///
    /// Returns a single `"model product/version"` string, e.g.
    /// `"FW-55BZ35F BRAVIA/5.0.1"`.
    pub async fn get_device_info(&self) -> Result<String> {
        let result = self
            .transport
            .call(Service::System, "getInterfaceInformation", vec![], "1.0")
            .await?;
        let first = take_first("getInterfaceInformation", result)?;
        let info: InterfaceInformation = serde_json::from_value(first.clone())
            .map_err(|_| BraviaError::MalformedResponse(first.to_string()))?;

        Ok(format!(
            "{} {}/{}",
            info.model_name, info.product_name, info.interface_version
        ))
    }

    // ========== Playback ==========

    /// Query the currently playing content
    ///
    /// The device reports conditions like "display is off" through its error
    /// envelope; those resolve to [`PlaybackInfo::Unavailable`] with the
    /// reported message rather than failing.
    pub async fn get_playback_info(&self) -> Result<PlaybackInfo> {
        let (response, body) = self
            .transport
            .call_unchecked(Service::AvContent, "getPlayingContentInfo", vec![], "1.0")
            .await?;

        if let Some((_code, message)) = response.error_pair() {
            return Ok(PlaybackInfo::Unavailable(message));
        }

        let result = response.result.ok_or_else(|| BraviaError::MissingResult {
            method: "getPlayingContentInfo".to_string(),
            body,
        })?;
        let first = take_first("getPlayingContentInfo", result)?;
        let info: PlayingContentInfo = serde_json::from_value(first.clone())
            .map_err(|_| BraviaError::MalformedResponse(first.to_string()))?;

        Ok(PlaybackInfo::Content(info))
    }

    /// Select the content to play
    pub async fn select_content(&self, uri: &str) -> Result<()> {
        let params = vec![json!({ "uri": uri })];
        self.transport
            .call(Service::AvContent, "setPlayContent", params, "1.0")
            .await?;
        Ok(())
    }

    // ========== Content Listing ==========

    /// List the URI schemes the device can play from
    pub async fn list_schemes(&self) -> Result<Vec<String>> {
        let result = self
            .transport
            .call(Service::AvContent, "getSchemeList", vec![], "1.0")
            .await?;
        let first = take_first("getSchemeList", result)?;
        let entries: Vec<SchemeEntry> = serde_json::from_value(first.clone())
            .map_err(|_| BraviaError::MalformedResponse(first.to_string()))?;

        Ok(entries.into_iter().map(|e| e.scheme).collect())
    }

    /// List the sources available under a scheme (e.g. `"tv"`, `"extInput"`)
    pub async fn list_sources(&self, scheme: &str) -> Result<Vec<String>> {
        let params = vec![json!({ "scheme": scheme })];
        let result = self
            .transport
            .call(Service::AvContent, "getSourceList", params, "1.0")
            .await?;
        let first = take_first("getSourceList", result)?;
        let entries: Vec<SourceEntry> = serde_json::from_value(first.clone())
            .map_err(|_| BraviaError::MalformedResponse(first.to_string()))?;

        Ok(entries.into_iter().map(|e| e.source).collect())
    }

    /// List content under a source URI
    ///
    /// The accepted parameter shape of `getContentList` varies by firmware
    /// version, so the version is resolved through the supported-API table
    /// before the request is built.
    pub async fn list_content(
        &self,
        start: u32,
        count: u32,
        source_uri: &str,
    ) -> Result<Vec<ContentItem>> {
        let version = self.version_for(Service::AvContent, "getContentList").await?;

        // Older firmware takes the source as "source"; newer takes it as "uri".
        let params = if matches!(version.as_str(), "1.0" | "1.1" | "1.2") {
            vec![json!({ "source": source_uri, "stIdx": start, "cnt": count })]
        } else {
            vec![json!({ "uri": source_uri, "stIdx": start, "cnt": count })]
        };

        let result = self
            .transport
            .call(Service::AvContent, "getContentList", params, &version)
            .await?;
        let first = take_first("getContentList", result)?;

        serde_json::from_value(first.clone())
            .map_err(|_| BraviaError::MalformedResponse(first.to_string()))
    }

    // ========== Applications ==========

    /// List the applications installed on the television
    pub async fn list_applications(&self) -> Result<Vec<AppInfo>> {
        let result = self
            .transport
            .call(Service::AppControl, "getApplicationList", vec![], "1.0")
            .await?;
        let first = take_first("getApplicationList", result)?;

        serde_json::from_value(first.clone())
            .map_err(|_| BraviaError::MalformedResponse(first.to_string()))
    }

    /// Launch the application with the given URI
    pub async fn launch_application(&self, uri: &str) -> Result<()> {
        let params = vec![json!({ "uri": uri })];
        self.transport
            .call(Service::AppControl, "setActiveApp", params, "1.0")
            .await?;
        Ok(())
    }

    /// Terminate all terminable applications
    pub async fn terminate_applications(&self) -> Result<()> {
        self.transport
            .call(Service::AppControl, "terminateApps", vec![], "1.0")
            .await?;
        Ok(())
    }

    // ========== Volume ==========

    /// Query volume state for every audio output target
    pub async fn get_volume_information(&self) -> Result<Vec<VolumeInformation>> {
        let result = self
            .transport
            .call(Service::Audio, "getVolumeInformation", vec![], "1.0")
            .await?;
        let first = take_first("getVolumeInformation", result)?;

        serde_json::from_value(first.clone())
            .map_err(|_| BraviaError::MalformedResponse(first.to_string()))
    }

    /// Set the volume on a target; an empty target addresses all outputs
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use bravia_control::BraviaClient;
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// # let tv = BraviaClient::new("192.168.1.42", "0000")?;
    /// tv.set_volume("speaker", 25).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn set_volume(&self, target: &str, volume: u32) -> Result<()> {
        // The version 1.0 method takes the volume as a string.
        let params = vec![json!({ "target": target, "volume": volume.to_string() })];
        self.transport
            .call(Service::Audio, "setAudioVolume", params, "1.0")
            .await?;
        Ok(())
    }

    /// Mute or unmute the television
    pub async fn set_mute(&self, mute: bool) -> Result<()> {
        let params = vec![json!({ "status": mute })];
        self.transport
            .call(Service::Audio, "setAudioMute", params, "1.0")
            .await?;
        Ok(())
    }
}

#[derive(Deserialize)]
struct PowerStatus {
    status: String,
}

#[derive(Deserialize)]
struct SchemeEntry {
    scheme: String,
}

#[derive(Deserialize)]
struct SourceEntry {
    source: String,
}

#[derive(Deserialize)]
struct ServiceApiInfo {
    #[serde(default)]
    apis: Vec<ApiEntry>,
}

#[derive(Deserialize)]
struct ApiEntry {
    name: String,
    #[serde(default)]
    versions: Vec<ApiVersionEntry>,
}

#[derive(Deserialize)]
struct ApiVersionEntry {
    version: String,
}

/// Take the first result element, failing loudly when the list is empty
fn take_first(method: &str, mut result: Vec<Value>) -> Result<Value> {
    if result.is_empty() {
        return Err(BraviaError::MissingResult {
            method: method.to_string(),
            body: "[]".to_string(),
        });
    }
    Ok(result.swap_remove(0))
}
