use crate::error::{BraviaError, Result};
use crate::types::DiscoveredDevice;
use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::{timeout, Instant};

const SSDP_ADDR: &str = "239.255.255.250:1900";
const SEARCH_TARGET: &str = "urn:schemas-sony-com:service:ScalarWebAPI:1";
const DESCRIPTOR_TIMEOUT: Duration = Duration::from_secs(10);

/// Run a one-shot discovery scan for BRAVIA televisions on the local network
///
/// Broadcasts one M-SEARCH for the Sony ScalarWebAPI service type and collects
/// responses until the scan window closes; responses arriving after the
/// deadline are never incorporated. Each responder's descriptor document is
/// then fetched and parsed; responders whose descriptor lacks the Sony control
/// services are filtered out (other UPnP devices answer the same broadcast).
///
/// A descriptor that cannot be fetched or parsed fails the whole scan.
/// Concurrent scans are independent and share no state.
///
/// # Example
///
/// ```no_run
/// use bravia_control::discover;
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     for device in discover(Duration::from_secs(3)).await? {
///         println!("Found {} at {}", device.friendly_name, device.host);
///     }
///     Ok(())
/// }
/// ```
pub async fn discover(window: Duration) -> Result<Vec<DiscoveredDevice>> {
    let socket = UdpSocket::bind("0.0.0.0:0").await?;

    let request = format!(
        "M-SEARCH * HTTP/1.1\r\n\
         HOST: 239.255.255.250:1900\r\n\
         MAN: \"ssdp:discover\"\r\n\
         MX: 2\r\n\
         ST: {}\r\n\
         \r\n",
        SEARCH_TARGET
    );
    socket.send_to(request.as_bytes(), SSDP_ADDR).await?;
    tracing::info!("Sent M-SEARCH for {}", SEARCH_TARGET);

    let deadline = Instant::now() + window;
    let mut locations: Vec<String> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut buf = [0u8; 2048];

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }

        match timeout(remaining, socket.recv_from(&mut buf)).await {
            Ok(Ok((len, addr))) => {
                let text = String::from_utf8_lossy(&buf[..len]);
                if let Some(location) = parse_search_response(&text) {
                    tracing::debug!("SSDP response from {}: {}", addr, location);
                    if seen.insert(location.clone()) {
                        locations.push(location);
                    }
                }
            }
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => break, // deadline reached
        }
    }

    tracing::info!("Scan window closed with {} candidate(s)", locations.len());

    let http = reqwest::Client::builder()
        .timeout(DESCRIPTOR_TIMEOUT)
        .build()?;
    fetch_devices(&http, &locations).await
}

/// Fetch and parse the descriptor document for each collected location
///
/// One malformed or unreachable descriptor fails the whole batch.
async fn fetch_devices(
    http: &reqwest::Client,
    locations: &[String],
) -> Result<Vec<DiscoveredDevice>> {
    let mut devices = Vec::new();

    for location in locations {
        let body = http.get(location).send().await?.text().await?;
        let descriptor = DeviceDescription::from_xml(&body)?;

        if !descriptor.has_control_service() {
            tracing::debug!("Skipping non-television responder at {}", location);
            continue;
        }

        let (host, port) = host_and_port(location).ok_or_else(|| {
            BraviaError::MalformedResponse(format!("unusable descriptor location: {location}"))
        })?;

        tracing::info!("Discovered {} at {}", descriptor.friendly_name, host);
        devices.push(DiscoveredDevice {
            host,
            port,
            friendly_name: descriptor.friendly_name,
            manufacturer: descriptor.manufacturer,
            id: descriptor.udn,
        });
    }

    Ok(devices)
}

/// UPnP descriptor document root
#[derive(Debug, Deserialize)]
struct Root {
    device: DeviceDescription,
}

/// Device metadata parsed from the descriptor document
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeviceDescription {
    friendly_name: String,
    manufacturer: String,
    #[serde(rename = "UDN")]
    udn: String,
    #[serde(default)]
    service_list: Option<ServiceList>,
}

#[derive(Debug, Deserialize)]
struct ServiceList {
    #[serde(rename = "service", default)]
    services: Vec<ServiceEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServiceEntry {
    service_type: String,
}

impl DeviceDescription {
    fn from_xml(xml: &str) -> Result<Self> {
        let root: Root = quick_xml::de::from_str(xml)
            .map_err(|e| BraviaError::MalformedResponse(format!("device descriptor: {e}")))?;
        Ok(root.device)
    }

    /// Whether the descriptor advertises the Sony control services
    fn has_control_service(&self) -> bool {
        self.service_list
            .as_ref()
            .map(|list| {
                list.services.iter().any(|s| {
                    s.service_type.contains(":IRCC:") || s.service_type.contains(":ScalarWebAPI:")
                })
            })
            .unwrap_or(false)
    }
}

/// Extract the LOCATION header from an M-SEARCH response
fn parse_search_response(response: &str) -> Option<String> {
    let mut lines = response.lines();

    let status = lines.next()?.trim();
    if !(status.starts_with("HTTP/") && status.contains(" 200 ")) {
        return None;
    }

    for line in lines {
        if let Some(value) = extract_header_value(line.trim(), "LOCATION:") {
            return Some(value);
        }
    }
    None
}

/// Extract a header value from a line like "HEADER: value"
fn extract_header_value(line: &str, header: &str) -> Option<String> {
    if line.len() > header.len() && line[..header.len()].eq_ignore_ascii_case(header) {
        Some(line[header.len()..].trim().to_string())
    } else {
        None
    }
}

/// Pull host and port out of a descriptor location URL
fn host_and_port(url: &str) -> Option<(String, u16)> {
    let rest = url.split("//").nth(1)?;
    let authority = rest.split('/').next()?;

    match authority.split_once(':') {
        Some((host, port)) => Some((host.to_string(), port.parse().ok()?)),
        None => Some((authority.to_string(), 80)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BRAVIA_DESCRIPTOR: &str = r#"<?xml version="1.0"?>
<root xmlns="urn:schemas-upnp-org:device-1-0">
  <device>
    <deviceType>urn:schemas-upnp-org:device:MediaRenderer:1</deviceType>
    <friendlyName>Living Room TV</friendlyName>
    <manufacturer>Sony Corporation</manufacturer>
    <modelName>FW-55BZ35F</modelName>
    <UDN>uuid:00000000-0000-1010-8000-bc60a7d299b2</UDN>
    <serviceList>
      <service>
        <serviceType>urn:schemas-sony-com:service:IRCC:1</serviceType>
        <serviceId>urn:schemas-sony-com:serviceId:IRCC</serviceId>
        <controlURL>/sony/IRCC</controlURL>
      </service>
      <service>
        <serviceType>urn:schemas-sony-com:service:ScalarWebAPI:1</serviceType>
        <serviceId>urn:schemas-sony-com:serviceId:ScalarWebAPI</serviceId>
        <controlURL>/sony</controlURL>
      </service>
    </serviceList>
  </device>
</root>"#;

    const ROUTER_DESCRIPTOR: &str = r#"<?xml version="1.0"?>
<root xmlns="urn:schemas-upnp-org:device-1-0">
  <device>
    <deviceType>urn:schemas-upnp-org:device:InternetGatewayDevice:1</deviceType>
    <friendlyName>Router</friendlyName>
    <manufacturer>Generic Networks</manufacturer>
    <UDN>uuid:router-1234</UDN>
    <serviceList>
      <service>
        <serviceType>urn:schemas-upnp-org:service:Layer3Forwarding:1</serviceType>
        <serviceId>urn:upnp-org:serviceId:L3Forwarding1</serviceId>
        <controlURL>/upnp/control/L3F</controlURL>
      </service>
    </serviceList>
  </device>
</root>"#;

    #[test]
    fn parses_search_response_location() {
        let response = "HTTP/1.1 200 OK\r\n\
            CACHE-CONTROL: max-age=1800\r\n\
            LOCATION: http://192.168.1.42:52323/dmr.xml\r\n\
            ST: urn:schemas-sony-com:service:ScalarWebAPI:1\r\n\
            USN: uuid:00000000-0000-1010-8000-bc60a7d299b2\r\n\
            \r\n";

        assert_eq!(
            parse_search_response(response),
            Some("http://192.168.1.42:52323/dmr.xml".to_string())
        );
    }

    #[test]
    fn header_matching_is_case_insensitive() {
        let response = "HTTP/1.1 200 OK\r\n\
            location: http://192.168.1.42:52323/dmr.xml\r\n\
            \r\n";

        assert_eq!(
            parse_search_response(response),
            Some("http://192.168.1.42:52323/dmr.xml".to_string())
        );
    }

    #[test]
    fn non_200_responses_are_ignored() {
        let response = "HTTP/1.1 404 Not Found\r\n\
            LOCATION: http://192.168.1.42:52323/dmr.xml\r\n\
            \r\n";

        assert_eq!(parse_search_response(response), None);
    }

    #[test]
    fn responses_without_location_are_ignored() {
        let response = "HTTP/1.1 200 OK\r\n\
            ST: urn:schemas-sony-com:service:ScalarWebAPI:1\r\n\
            \r\n";

        assert_eq!(parse_search_response(response), None);
    }

    #[test]
    fn extracts_host_and_port_from_location() {
        assert_eq!(
            host_and_port("http://192.168.1.42:52323/dmr.xml"),
            Some(("192.168.1.42".to_string(), 52323))
        );
        assert_eq!(
            host_and_port("http://192.168.1.42/dmr.xml"),
            Some(("192.168.1.42".to_string(), 80))
        );
        assert_eq!(host_and_port("not a url"), None);
    }

    #[test]
    fn bravia_descriptor_advertises_control_services() {
        let descriptor = DeviceDescription::from_xml(BRAVIA_DESCRIPTOR).unwrap();

        assert_eq!(descriptor.friendly_name, "Living Room TV");
        assert_eq!(descriptor.manufacturer, "Sony Corporation");
        assert_eq!(descriptor.udn, "uuid:00000000-0000-1010-8000-bc60a7d299b2");
        assert!(descriptor.has_control_service());
    }

    #[test]
    fn foreign_descriptor_lacks_control_services() {
        let descriptor = DeviceDescription::from_xml(ROUTER_DESCRIPTOR).unwrap();
        assert!(!descriptor.has_control_service());
    }

    #[test]
    fn malformed_descriptor_is_an_error() {
        assert!(DeviceDescription::from_xml("<root><device></root>").is_err());
        assert!(DeviceDescription::from_xml("not xml").is_err());
    }

    #[tokio::test]
    async fn non_target_responders_are_filtered_out() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/dmr.xml")
            .with_body(BRAVIA_DESCRIPTOR)
            .create_async()
            .await;
        server
            .mock("GET", "/igd.xml")
            .with_body(ROUTER_DESCRIPTOR)
            .create_async()
            .await;

        let http = reqwest::Client::new();
        let locations = vec![
            format!("{}/dmr.xml", server.url()),
            format!("{}/igd.xml", server.url()),
        ];

        let devices = fetch_devices(&http, &locations).await.unwrap();

        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].friendly_name, "Living Room TV");
        // Connection coordinates come from the descriptor location.
        let (host, port) = host_and_port(&locations[0]).unwrap();
        assert_eq!(devices[0].host, host);
        assert_eq!(devices[0].port, port);
    }

    #[tokio::test]
    async fn one_malformed_descriptor_fails_the_scan() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/dmr.xml")
            .with_body(BRAVIA_DESCRIPTOR)
            .create_async()
            .await;
        server
            .mock("GET", "/broken.xml")
            .with_body("<root><device>truncated")
            .create_async()
            .await;

        let http = reqwest::Client::new();
        let locations = vec![
            format!("{}/dmr.xml", server.url()),
            format!("{}/broken.xml", server.url()),
        ];

        let err = fetch_devices(&http, &locations).await.unwrap_err();
        match err {
            BraviaError::MalformedResponse(detail) => {
                assert!(detail.contains("device descriptor"));
            }
            other => panic!("expected MalformedResponse, got {other:?}"),
        }
    }
}
