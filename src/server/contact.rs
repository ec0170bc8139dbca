//! Contact form relay: validate, persist, then email in the background.

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::ContactSettings;
use crate::email::{escape_html, Mailer, OutboundEmail};
use crate::error::{FolioError, Result};
use crate::server::AppState;
use crate::store::ContactRecord;

const DEFAULT_SUBJECT: &str = "New Portfolio Contact Form Submission";

#[derive(Debug, Clone, Deserialize)]
pub struct ContactSubmission {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub subject: Option<String>,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ContactResponse {
    pub success: bool,
    pub message: String,
    pub id: Uuid,
}

fn check_len(field: &str, value: &str, min: usize, max: usize) -> Result<()> {
    let len = value.chars().count();
    if len < min || len > max {
        return Err(FolioError::Validation(format!(
            "{} must be {}-{} characters",
            field, min, max
        )));
    }
    Ok(())
}

/// `local@domain.tld` with no whitespace
fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain
            .split_once('.')
            .is_some_and(|(host, _)| !host.is_empty())
        && !domain.ends_with('.')
}

impl ContactSubmission {
    pub fn validate(&self) -> Result<()> {
        check_len("name", self.name.trim(), 2, 100)?;
        if !is_valid_email(&self.email) {
            return Err(FolioError::Validation("email address is invalid".to_string()));
        }
        if let Some(subject) = &self.subject {
            check_len("subject", subject, 0, 200)?;
        }
        check_len("message", &self.message, 10, 2000)
    }

    fn subject_line(&self) -> &str {
        self.subject
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(DEFAULT_SUBJECT)
    }

    fn to_email(&self, contact: &ContactSettings) -> OutboundEmail {
        let subject = self.subject_line();
        let html = format!(
            "<h2>New Contact Form Submission</h2>\
             <p><strong>From:</strong> {} ({})</p>\
             <p><strong>Subject:</strong> {}</p>\
             <p><strong>Message:</strong></p>\
             <p>{}</p>\
             <hr>\
             <p><small>Submitted at: {}</small></p>",
            escape_html(&self.name),
            escape_html(&self.email),
            escape_html(subject),
            escape_html(&self.message),
            Utc::now().to_rfc3339(),
        );

        OutboundEmail {
            from: contact.email_from.clone(),
            to: contact.contact_email.clone(),
            subject: format!("Portfolio Contact: {}", subject),
            html,
        }
    }
}

/// Rate-limit key for the caller: first forwarded address, else "unknown"
fn client_key(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .or_else(|| headers.get("x-real-ip").and_then(|v| v.to_str().ok()))
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or("unknown")
        .to_string()
}

fn spawn_delivery(mailer: Arc<dyn Mailer>, email: OutboundEmail, record_id: Uuid) {
    tokio::spawn(async move {
        match mailer.send(&email).await {
            Ok(provider_id) => {
                tracing::info!(%record_id, %provider_id, "contact email sent");
            }
            Err(e) => {
                tracing::error!(%record_id, error = %e, "contact email failed");
            }
        }
    });
}

pub async fn submit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<ContactSubmission>,
) -> Result<Json<ContactResponse>> {
    if let Some(limiter) = &state.contact_limiter {
        let client = client_key(&headers);
        if let Err(retry_after) = limiter.check(&client) {
            tracing::warn!(
                client = %client,
                retry_after_secs = retry_after.as_secs(),
                "contact submission throttled"
            );
            return Err(FolioError::TooManyRequests);
        }
    }

    body.validate()?;

    let record = ContactRecord {
        id: Uuid::new_v4(),
        name: body.name.trim().to_string(),
        email: body.email.clone(),
        subject: body.subject.clone(),
        message: body.message.clone(),
        created_at: Utc::now(),
    };
    let id = record.id;
    state.store.save_contact(record).await?;

    match &state.mailer {
        Some(mailer) => spawn_delivery(mailer.clone(), body.to_email(&state.settings.contact), id),
        None => tracing::warn!(%id, "contact saved without email relay"),
    }

    Ok(Json(ContactResponse {
        success: true,
        message: "Transmission successful. Uplink established.".to_string(),
        id,
    }))
}
