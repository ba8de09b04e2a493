//! Graph API Send client

use super::{OutboundMessage, SendError};
use crate::runtime::MessageSender;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_GRAPH_API_URL: &str = "https://graph.facebook.com/v18.0";

/// Posts replies to the platform's `/me/messages` endpoint
pub struct GraphApiSender {
    client: Client,
    endpoint: String,
    access_token: String,
}

impl GraphApiSender {
    pub fn new(base_url: &str, access_token: String, timeout: Duration) -> Result<Self, SendError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/me/messages", base_url.trim_end_matches('/')),
            access_token,
        })
    }
}

#[derive(Debug, Serialize)]
struct SendRequest<'a> {
    recipient: Recipient<'a>,
    messaging_type: &'static str,
    message: &'a OutboundMessage,
}

#[derive(Debug, Serialize)]
struct Recipient<'a> {
    id: &'a str,
}

#[derive(Debug, Deserialize)]
struct GraphErrorBody {
    error: GraphError,
}

#[derive(Debug, Deserialize)]
struct GraphError {
    message: String,
    #[serde(default)]
    code: Option<i64>,
}

fn request_body<'a>(recipient: &'a str, message: &'a OutboundMessage) -> SendRequest<'a> {
    SendRequest {
        recipient: Recipient { id: recipient },
        messaging_type: "RESPONSE",
        message,
    }
}

#[async_trait]
impl MessageSender for GraphApiSender {
    async fn send(&self, recipient: &str, message: &OutboundMessage) -> Result<(), SendError> {
        let response = self
            .client
            .post(&self.endpoint)
            .query(&[("access_token", self.access_token.as_str())])
            .json(&request_body(recipient, message))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        let message = match serde_json::from_str::<GraphErrorBody>(&body) {
            Ok(parsed) => match parsed.error.code {
                Some(code) => format!("{} (code {code})", parsed.error.message),
                None => parsed.error.message,
            },
            Err(_) => format!("HTTP {status}"),
        };
        Err(SendError::from_status(status.as_u16(), message))
    }
}
