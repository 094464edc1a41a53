use crate::error::{BraviaError, Result};
use crate::protocol::{self, RpcRequest, RpcResponse, Service};
use serde_json::Value;
use std::time::Duration;

/// Low-level HTTP transport shared by both request encodings
///
/// Owns the connection coordinates (host, port, pre-shared key, timeout) and a
/// single HTTP client. The shared secret is attached identically to every
/// request, and no request is ever retried; each failure propagates to the
/// caller immediately.
#[derive(Debug, Clone)]
pub(crate) struct Transport {
    http: reqwest::Client,
    base_url: String,
    psk: String,
}

impl Transport {
    pub fn new(host: &str, port: u16, psk: String, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http,
            base_url: format!("http://{}:{}/sony", host, port),
            psk,
        })
    }

    /// Submit one resolved IRCC code via the legacy SOAP encoding
    ///
    /// Success is HTTP 200 with a body that is not a fault. Fault bodies decode
    /// to an application error; bodies that decode as neither are surfaced raw.
    pub async fn send_ircc(&self, code: &str) -> Result<()> {
        let url = format!("{}/IRCC", self.base_url);
        tracing::debug!("Sending IRCC code {} to {}", code, url);

        let response = self
            .http
            .post(&url)
            .header("Content-Type", "text/xml; charset=UTF-8")
            .header("SOAPACTION", protocol::IRCC_SOAP_ACTION)
            .header("X-Auth-PSK", &self.psk)
            .body(protocol::ircc_envelope(code))
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await?;

        match protocol::parse_soap_fault(&body) {
            None if status == 200 => Ok(()),
            Some((code, message)) => Err(BraviaError::Application {
                method: "X_SendIRCC".to_string(),
                code,
                message,
            }),
            None => Err(BraviaError::MalformedResponse(body)),
        }
    }

    /// Perform a structured call, classifying transport and HTTP failures only
    ///
    /// Returns the decoded response together with the raw body so the caller
    /// can interpret the error envelope itself. `call` is the right entry
    /// point for everything that treats an error envelope as a failure.
    pub async fn call_unchecked(
        &self,
        service: Service,
        method: &str,
        params: Vec<Value>,
        version: &str,
    ) -> Result<(RpcResponse, String)> {
        let url = format!("{}/{}", self.base_url, service.path());
        let request = RpcRequest::new(method, params, version);
        let payload = serde_json::to_string(&request)?;
        tracing::debug!("Calling {} {}: {}", url, method, payload);

        let response = self
            .http
            .post(&url)
            .header("Content-Type", "application/json; charset=UTF-8")
            .header("X-Auth-PSK", &self.psk)
            .body(payload)
            .send()
            .await?;

        let status = response.status().as_u16();
        if status != 200 {
            return Err(BraviaError::HttpStatus {
                method: method.to_string(),
                status,
            });
        }

        let body = response.text().await?;
        tracing::debug!("Received: {}", body);

        let parsed: RpcResponse = serde_json::from_str(&body)
            .map_err(|_| BraviaError::MalformedResponse(body.clone()))?;

        Ok((parsed, body))
    }

    /// Perform a structured call with full error classification
    pub async fn call(
        &self,
        service: Service,
        method: &str,
        params: Vec<Value>,
        version: &str,
    ) -> Result<Vec<Value>> {
        let (parsed, body) = self.call_unchecked(service, method, params, version).await?;

        if let Some((code, message)) = parsed.error_pair() {
            return Err(BraviaError::Application {
                method: method.to_string(),
                code,
                message,
            });
        }

        parsed.result.ok_or_else(|| BraviaError::MissingResult {
            method: method.to_string(),
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const IRCC_OK: &str = r#"<?xml version="1.0"?>
<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/">
    <s:Body>
        <u:X_SendIRCCResponse xmlns:u="urn:schemas-sony-com:service:IRCC:1"/>
    </s:Body>
</s:Envelope>"#;

    const IRCC_FAULT: &str = r#"<?xml version="1.0"?>
<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/">
    <s:Body>
        <s:Fault>
            <faultcode>s:Client</faultcode>
            <faultstring>UPnPError</faultstring>
            <detail>
                <UPnPError xmlns="urn:schemas-upnp-org:control-1-0">
                    <errorCode>800</errorCode>
                    <errorDescription>Cannot accept the IRCC code</errorDescription>
                </UPnPError>
            </detail>
        </s:Fault>
    </s:Body>
</s:Envelope>"#;

    fn transport_for(server: &mockito::ServerGuard) -> Transport {
        let (host, port) = server.host_with_port().split_once(':').map(|(h, p)| (h.to_string(), p.parse().unwrap())).unwrap();
        Transport::new(&host, port, "0000".to_string(), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn structured_call_attaches_psk_and_content_type() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/sony/system")
            .match_header("x-auth-psk", "0000")
            .match_header("content-type", "application/json; charset=UTF-8")
            .match_body(mockito::Matcher::PartialJson(json!({
                "method": "getPowerStatus",
                "id": 1,
                "version": "1.0",
            })))
            .with_body(r#"{"result": [{"status": "active"}], "id": 1}"#)
            .create_async()
            .await;

        let transport = transport_for(&server);
        let result = transport
            .call(Service::System, "getPowerStatus", vec![], "1.0")
            .await
            .unwrap();

        assert_eq!(result[0]["status"], "active");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn non_200_is_an_http_status_error_even_with_a_decodable_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/sony/avContent")
            .with_status(500)
            .with_body(r#"{"error": [12, "whatever"], "id": 1}"#)
            .create_async()
            .await;

        let transport = transport_for(&server);
        let err = transport
            .call(Service::AvContent, "getPlayingContentInfo", vec![], "1.0")
            .await
            .unwrap_err();

        match err {
            BraviaError::HttpStatus { method, status } => {
                assert_eq!(method, "getPlayingContentInfo");
                assert_eq!(status, 500);
            }
            other => panic!("expected HttpStatus, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn error_envelope_is_an_application_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/sony/system")
            .with_body(r#"{"error": [403, "Forbidden"], "id": 1}"#)
            .create_async()
            .await;

        let transport = transport_for(&server);
        let err = transport
            .call(Service::System, "setPowerStatus", vec![], "1.0")
            .await
            .unwrap_err();

        match err {
            BraviaError::Application { method, code, message } => {
                assert_eq!(method, "setPowerStatus");
                assert_eq!(code, 403);
                assert_eq!(message, "Forbidden");
            }
            other => panic!("expected Application, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_result_echoes_the_raw_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/sony/system")
            .with_body(r#"{"id": 1}"#)
            .create_async()
            .await;

        let transport = transport_for(&server);
        let err = transport
            .call(Service::System, "getPowerStatus", vec![], "1.0")
            .await
            .unwrap_err();

        match err {
            BraviaError::MissingResult { method, body } => {
                assert_eq!(method, "getPowerStatus");
                assert_eq!(body, r#"{"id": 1}"#);
            }
            other => panic!("expected MissingResult, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unparseable_body_is_malformed() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/sony/system")
            .with_body("<html>not json</html>")
            .create_async()
            .await;

        let transport = transport_for(&server);
        let err = transport
            .call(Service::System, "getPowerStatus", vec![], "1.0")
            .await
            .unwrap_err();

        match err {
            BraviaError::MalformedResponse(body) => assert_eq!(body, "<html>not json</html>"),
            other => panic!("expected MalformedResponse, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn ircc_submission_sends_the_soap_envelope() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/sony/IRCC")
            .match_header("x-auth-psk", "0000")
            .match_header("soapaction", protocol::IRCC_SOAP_ACTION)
            .match_header("content-type", "text/xml; charset=UTF-8")
            .match_body(mockito::Matcher::Regex(
                "<IRCCCode>AAAAAQAAAAEAAAAVAw==</IRCCCode>".to_string(),
            ))
            .with_body(IRCC_OK)
            .create_async()
            .await;

        let transport = transport_for(&server);
        transport.send_ircc("AAAAAQAAAAEAAAAVAw==").await.unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn ircc_fault_decodes_to_an_application_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/sony/IRCC")
            .with_status(500)
            .with_body(IRCC_FAULT)
            .create_async()
            .await;

        let transport = transport_for(&server);
        let err = transport.send_ircc("AAAAAQAAAAEAAAAVAw==").await.unwrap_err();

        match err {
            BraviaError::Application { method, code, message } => {
                assert_eq!(method, "X_SendIRCC");
                assert_eq!(code, 800);
                assert_eq!(message, "Cannot accept the IRCC code");
            }
            other => panic!("expected Application, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn ircc_undecodable_error_body_is_surfaced_raw() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/sony/IRCC")
            .with_status(500)
            .with_body("<html>Internal Server Error</html>")
            .create_async()
            .await;

        let transport = transport_for(&server);
        let err = transport.send_ircc("AAAAAQAAAAEAAAAVAw==").await.unwrap_err();

        match err {
            BraviaError::MalformedResponse(body) => {
                assert_eq!(body, "<html>Internal Server Error</html>");
            }
            other => panic!("expected MalformedResponse, got {other:?}"),
        }
    }
}
