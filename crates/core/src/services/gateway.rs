//! Push gateway client.
//!
//! Speaks the Expo push service wire format: a send endpoint that accepts
//! arrays of messages and answers with one ticket per message, and a receipt
//! endpoint that resolves ticket ids to final delivery outcomes.

use async_trait::async_trait;
use barrio_common::{AppError, AppResult, config::PushConfig};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

use crate::services::message::PushMessage;

/// Outcome reported by the gateway for a ticket or receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Ok,
    Error,
}

/// Classified gateway error from a ticket or receipt `details.error`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryFailure {
    /// The device token is no longer valid.
    DeviceNotRegistered,
    /// The payload exceeded the gateway's size limit.
    MessageTooBig,
    /// Too many messages were sent to the device.
    MessageRateExceeded,
    /// The token belongs to a different sender.
    MismatchSenderId,
    /// The gateway could not authenticate against the platform service.
    InvalidCredentials,
    /// Anything else, with the raw code if there was one.
    Other(Option<String>),
}

impl DeliveryFailure {
    /// Classify from the `details` object of a ticket or receipt.
    #[must_use]
    pub fn from_details(details: Option<&Value>) -> Self {
        let code = details
            .and_then(|d| d.get("error"))
            .and_then(Value::as_str);
        match code {
            Some("DeviceNotRegistered") => Self::DeviceNotRegistered,
            Some("MessageTooBig") => Self::MessageTooBig,
            Some("MessageRateExceeded") => Self::MessageRateExceeded,
            Some("MismatchSenderId") => Self::MismatchSenderId,
            Some("InvalidCredentials") => Self::InvalidCredentials,
            other => Self::Other(other.map(str::to_string)),
        }
    }
}

impl std::fmt::Display for DeliveryFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DeviceNotRegistered => write!(f, "DeviceNotRegistered"),
            Self::MessageTooBig => write!(f, "MessageTooBig"),
            Self::MessageRateExceeded => write!(f, "MessageRateExceeded"),
            Self::MismatchSenderId => write!(f, "MismatchSenderId"),
            Self::InvalidCredentials => write!(f, "InvalidCredentials"),
            Self::Other(Some(code)) => write!(f, "{code}"),
            Self::Other(None) => write!(f, "Unknown"),
        }
    }
}

/// Per-message acknowledgement from the send endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryTicket {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub status: DeliveryStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl DeliveryTicket {
    /// An accepted ticket.
    #[must_use]
    pub fn ok(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            status: DeliveryStatus::Ok,
            message: None,
            details: None,
        }
    }

    /// A rejected ticket carrying a `details.error` code.
    #[must_use]
    pub fn error(message: impl Into<String>, code: &str) -> Self {
        Self {
            id: None,
            status: DeliveryStatus::Error,
            message: Some(message.into()),
            details: Some(json!({ "error": code })),
        }
    }

    /// Id to look the receipt up with. Only accepted tickets have one.
    #[must_use]
    pub fn receipt_id(&self) -> Option<&str> {
        match self.status {
            DeliveryStatus::Ok => self.id.as_deref(),
            DeliveryStatus::Error => None,
        }
    }

    /// Classified failure, for error tickets.
    #[must_use]
    pub fn failure(&self) -> Option<DeliveryFailure> {
        (self.status == DeliveryStatus::Error)
            .then(|| DeliveryFailure::from_details(self.details.as_ref()))
    }
}

/// Final delivery outcome for one ticket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryReceipt {
    pub status: DeliveryStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl DeliveryReceipt {
    /// A delivered receipt.
    #[must_use]
    pub const fn ok() -> Self {
        Self {
            status: DeliveryStatus::Ok,
            message: None,
            details: None,
        }
    }

    /// A failed receipt carrying a `details.error` code.
    #[must_use]
    pub fn error(message: impl Into<String>, code: &str) -> Self {
        Self {
            status: DeliveryStatus::Error,
            message: Some(message.into()),
            details: Some(json!({ "error": code })),
        }
    }

    /// Classified failure, for error receipts.
    #[must_use]
    pub fn failure(&self) -> Option<DeliveryFailure> {
        (self.status == DeliveryStatus::Error)
            .then(|| DeliveryFailure::from_details(self.details.as_ref()))
    }
}

/// Transport to the push gateway.
///
/// An `Err` means the whole request failed. Per-message problems come back
/// as error tickets or receipts.
#[async_trait]
pub trait PushGateway: Send + Sync {
    /// Send one chunk. Returns tickets in message order.
    async fn send(&self, messages: &[PushMessage]) -> AppResult<Vec<DeliveryTicket>>;

    /// Look receipts up by ticket id. Unknown ids are absent from the map.
    async fn get_receipts(&self, ids: &[String]) -> AppResult<HashMap<String, DeliveryReceipt>>;
}

/// Type alias for a shared push gateway.
pub type PushGatewayService = Arc<dyn PushGateway>;

#[derive(Debug, Deserialize)]
struct GatewayErrorBody {
    #[serde(default)]
    code: Option<String>,
    message: String,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GatewayErrorBody>,
}

/// HTTP client for the Expo push service.
#[derive(Clone)]
pub struct ExpoPushGateway {
    client: Client,
    send_url: Url,
    receipts_url: Url,
    access_token: Option<String>,
}

impl ExpoPushGateway {
    /// Create a gateway client from configuration.
    pub fn new(config: &PushConfig) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .gzip(true)
            .user_agent(concat!("barrio-push/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            send_url: parse_endpoint(&config.send_url, "push.send_url")?,
            receipts_url: parse_endpoint(&config.receipts_url, "push.receipts_url")?,
            access_token: config.access_token.clone(),
        })
    }

    async fn post<B, T>(&self, url: &Url, body: &B) -> AppResult<T>
    where
        B: Serialize + Sync + ?Sized,
        T: DeserializeOwned,
    {
        let mut request = self
            .client
            .post(url.clone())
            .header("Accept", "application/json")
            .json(body);
        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(url = %url, status = %status, body = %body, "Push gateway rejected request");
            return Err(AppError::Gateway(format!("{status}: {body}")));
        }

        let envelope: Envelope<T> = response.json().await?;
        if !envelope.errors.is_empty() {
            let messages: Vec<String> = envelope
                .errors
                .iter()
                .map(|e| match &e.code {
                    Some(code) => format!("{code}: {}", e.message),
                    None => e.message.clone(),
                })
                .collect();
            return Err(AppError::Gateway(messages.join("; ")));
        }

        envelope
            .data
            .ok_or_else(|| AppError::Gateway("response has no data".to_string()))
    }
}

fn parse_endpoint(value: &str, key: &str) -> AppResult<Url> {
    Url::parse(value).map_err(|e| AppError::Config(format!("invalid {key}: {e}")))
}

#[async_trait]
impl PushGateway for ExpoPushGateway {
    async fn send(&self, messages: &[PushMessage]) -> AppResult<Vec<DeliveryTicket>> {
        debug!(count = messages.len(), "Sending push chunk");
        self.post(&self.send_url, messages).await
    }

    async fn get_receipts(&self, ids: &[String]) -> AppResult<HashMap<String, DeliveryReceipt>> {
        debug!(count = ids.len(), "Fetching push receipts");
        self.post(&self.receipts_url, &json!({ "ids": ids })).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::locale::Locale;
    use crate::services::message::MessageBuilder;
    use maplit::hashmap;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(server: &MockServer, token: Option<&str>) -> PushConfig {
        PushConfig {
            send_url: format!("{}/push/send", server.uri()),
            receipts_url: format!("{}/push/getReceipts", server.uri()),
            access_token: token.map(str::to_string),
            ..PushConfig::default()
        }
    }

    fn message(to: &str) -> PushMessage {
        MessageBuilder::default().chat_message(to, Locale::Es, Some("Ana"), Some("hi"), "c1")
    }

    #[test]
    fn test_failure_classification() {
        let details = json!({"error": "DeviceNotRegistered"});
        assert_eq!(
            DeliveryFailure::from_details(Some(&details)),
            DeliveryFailure::DeviceNotRegistered
        );
        assert_eq!(
            DeliveryFailure::from_details(Some(&json!({"error": "Weird"}))),
            DeliveryFailure::Other(Some("Weird".to_string()))
        );
        assert_eq!(DeliveryFailure::from_details(None), DeliveryFailure::Other(None));
        assert_eq!(DeliveryFailure::MessageTooBig.to_string(), "MessageTooBig");
    }

    #[test]
    fn test_ticket_receipt_id() {
        assert_eq!(DeliveryTicket::ok("t1").receipt_id(), Some("t1"));
        assert!(DeliveryTicket::ok("t1").failure().is_none());

        let rejected = DeliveryTicket::error("gone", "DeviceNotRegistered");
        assert_eq!(rejected.receipt_id(), None);
        assert_eq!(rejected.failure(), Some(DeliveryFailure::DeviceNotRegistered));

        let mut odd = DeliveryTicket::error("x", "MessageTooBig");
        odd.id = Some("t2".to_string());
        assert_eq!(odd.receipt_id(), None);
    }

    #[tokio::test]
    async fn test_send_parses_tickets() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/push/send"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [
                    {"status": "ok", "id": "t1"},
                    {"status": "error", "message": "not registered",
                     "details": {"error": "DeviceNotRegistered"}}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let gateway = ExpoPushGateway::new(&config(&server, None)).unwrap();
        let tickets = gateway
            .send(&[message("ExpoPushToken[a]"), message("ExpoPushToken[b]")])
            .await
            .unwrap();

        assert_eq!(tickets.len(), 2);
        assert_eq!(tickets[0], DeliveryTicket::ok("t1"));
        assert_eq!(tickets[1].failure(), Some(DeliveryFailure::DeviceNotRegistered));
    }

    #[tokio::test]
    async fn test_send_body_is_message_array() {
        let server = MockServer::start().await;
        let msg = message("ExpoPushToken[a]");
        Mock::given(method("POST"))
            .and(path("/push/send"))
            .and(body_json(json!([msg])))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"status": "ok", "id": "t1"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let gateway = ExpoPushGateway::new(&config(&server, None)).unwrap();
        gateway.send(&[msg]).await.unwrap();
    }

    #[tokio::test]
    async fn test_bearer_token_sent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("authorization", "Bearer secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
            .expect(1)
            .mount(&server)
            .await;

        let gateway = ExpoPushGateway::new(&config(&server, Some("secret"))).unwrap();
        assert!(gateway.send(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_http_failure_is_gateway_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
            .mount(&server)
            .await;

        let gateway = ExpoPushGateway::new(&config(&server, None)).unwrap();
        let result = gateway.send(&[message("ExpoPushToken[a]")]).await;
        assert!(matches!(result, Err(AppError::Gateway(_))));
    }

    #[tokio::test]
    async fn test_top_level_errors_are_gateway_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "errors": [{"code": "PUSH_TOO_MANY_EXPERIENCE_IDS", "message": "mixed projects"}]
            })))
            .mount(&server)
            .await;

        let gateway = ExpoPushGateway::new(&config(&server, None)).unwrap();
        match gateway.send(&[message("ExpoPushToken[a]")]).await {
            Err(AppError::Gateway(msg)) => assert!(msg.contains("PUSH_TOO_MANY_EXPERIENCE_IDS")),
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_get_receipts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/push/getReceipts"))
            .and(body_json(json!({"ids": ["t1", "t2", "t3"]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {
                    "t1": {"status": "ok"},
                    "t2": {"status": "error", "message": "too big",
                           "details": {"error": "MessageTooBig"}}
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let gateway = ExpoPushGateway::new(&config(&server, None)).unwrap();
        let ids = vec!["t1".to_string(), "t2".to_string(), "t3".to_string()];
        let receipts = gateway.get_receipts(&ids).await.unwrap();

        assert_eq!(
            receipts,
            hashmap! {
                "t1".to_string() => DeliveryReceipt::ok(),
                "t2".to_string() => DeliveryReceipt::error("too big", "MessageTooBig"),
            }
        );
    }

    #[test]
    fn test_invalid_endpoint_is_config_error() {
        let config = PushConfig {
            send_url: "not a url".to_string(),
            ..PushConfig::default()
        };
        assert!(matches!(
            ExpoPushGateway::new(&config),
            Err(AppError::Config(_))
        ));
    }
}
