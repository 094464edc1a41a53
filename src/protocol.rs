use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Correlation id attached to every structured call.
///
/// The device does not require per-call uniqueness, so a constant is reused.
pub(crate) const RPC_ID: u64 = 1;

/// SOAPACTION header value for legacy IRCC code submission
pub(crate) const IRCC_SOAP_ACTION: &str = "\"urn:schemas-sony-com:service:IRCC:1#X_SendIRCC\"";

/// Service namespaces the device groups its functionality under
///
/// Each namespace is a distinct path suffix below `/sony/` and a distinct
/// version-cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Service {
    System,
    VideoScreen,
    Audio,
    AvContent,
    Recording,
    AppControl,
    Encryption,
    Browser,
    Cec,
    Guide,
    AccessControl,
}

impl Service {
    /// The endpoint path suffix for this namespace
    pub fn path(&self) -> &'static str {
        match self {
            Service::System => "system",
            Service::VideoScreen => "videoScreen",
            Service::Audio => "audio",
            Service::AvContent => "avContent",
            Service::Recording => "recording",
            Service::AppControl => "appControl",
            Service::Encryption => "encryption",
            Service::Browser => "browser",
            Service::Cec => "cec",
            Service::Guide => "guide",
            Service::AccessControl => "accessControl",
        }
    }
}

/// Structured API request body
#[derive(Debug, Clone, Serialize)]
pub struct RpcRequest {
    pub method: String,
    pub id: u64,
    pub params: Vec<Value>,
    pub version: String,
}

impl RpcRequest {
    /// Create a new request for the given method at the given version
    pub fn new(method: impl Into<String>, params: Vec<Value>, version: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            id: RPC_ID,
            params,
            version: version.into(),
        }
    }
}

/// Structured API response body
///
/// Success bodies carry `result`, failure bodies carry an `error` pair of
/// `[code, message]`. Both are optional here so the caller can classify.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcResponse {
    #[serde(default)]
    pub result: Option<Vec<Value>>,
    #[serde(default)]
    pub error: Option<Vec<Value>>,
    #[serde(default)]
    pub id: Option<u64>,
}

impl RpcResponse {
    /// Decode the `[code, message]` error pair, if the body carries one
    pub fn error_pair(&self) -> Option<(i64, String)> {
        let error = self.error.as_ref().filter(|e| !e.is_empty())?;
        let code = error.first().and_then(Value::as_i64).unwrap_or(-1);
        let message = error
            .get(1)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        Some((code, message))
    }
}

/// Build the SOAP 1.1 envelope for one IRCC code submission
pub(crate) fn ircc_envelope(code: &str) -> String {
    format!(
        r#"<?xml version="1.0"?>
<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/" s:encodingStyle="http://schemas.xmlsoap.org/soap/encoding/">
    <s:Body>
        <u:X_SendIRCC xmlns:u="urn:schemas-sony-com:service:IRCC:1">
            <IRCCCode>{code}</IRCCCode>
        </u:X_SendIRCC>
    </s:Body>
</s:Envelope>"#
    )
}

/// Extract the UPnP error code and description from a SOAP fault body
///
/// Returns `None` when the body does not decode as a fault, so the caller can
/// fall back to a malformed-response error carrying the raw text.
pub(crate) fn parse_soap_fault(body: &str) -> Option<(i64, String)> {
    use quick_xml::events::Event;

    let mut reader = quick_xml::Reader::from_str(body);
    let mut saw_fault = false;
    let mut code: Option<i64> = None;
    let mut description = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"Fault" => saw_fault = true,
                b"errorCode" => {
                    code = reader.read_text(e.name()).ok()?.trim().parse().ok();
                }
                b"errorDescription" => {
                    description = reader.read_text(e.name()).ok()?.trim().to_string();
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(_) => return None,
            _ => {}
        }
    }

    if saw_fault {
        code.map(|c| (c, description))
    } else {
        None
    }
}
