//! Outbound email for contact submissions.

use crate::client::HttpClient;
use crate::error::{FolioError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One message handed to the email provider
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutboundEmail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub html: String,
}

/// Email provider seam
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Deliver the email and return the provider's message id
    async fn send(&self, email: &OutboundEmail) -> Result<String>;
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    id: String,
}

/// Mailer for the Resend HTTP API
pub struct ResendMailer {
    http: HttpClient,
    api_key: String,
    base_url: String,
}

impl ResendMailer {
    pub fn new(http: HttpClient, api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            http,
            api_key: api_key.into(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl Mailer for ResendMailer {
    async fn send(&self, email: &OutboundEmail) -> Result<String> {
        let url = format!("{}/emails", self.base_url.trim_end_matches('/'));
        let reply: SendResponse = self
            .http
            .post_json(&url, email, &self.api_key)
            .await
            .map_err(|e| FolioError::Email(e.to_string()))?;
        Ok(reply.id)
    }
}

/// Escape text for interpolation into HTML
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
