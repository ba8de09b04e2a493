//! Finalization: where completed forms go

use crate::runtime::ReportSink;
use crate::state_machine::Collected;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// A completed form handed to a report sink
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Submission {
    pub id: Uuid,
    pub flow: &'static str,
    pub sender_id: String,
    pub fields: Collected,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl Submission {
    pub fn new(
        flow: &'static str,
        sender_id: impl Into<String>,
        fields: Collected,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            flow,
            sender_id: sender_id.into(),
            fields,
            started_at,
            completed_at: Utc::now(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Report delivery failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Report endpoint returned HTTP {0}")]
    HttpStatus(u16),
    #[error("Report submission timed out")]
    Timeout,
}

fn log_completed(submission: &Submission) {
    let fields = serde_json::to_string(&submission.fields).unwrap_or_default();
    tracing::info!(
        submission_id = %submission.id,
        flow = submission.flow,
        sender_id = %submission.sender_id,
        fields = %fields,
        "Intake completed"
    );
}

/// Records submissions in the structured log only
#[derive(Debug, Default)]
pub struct LogReportSink;

#[async_trait]
impl ReportSink for LogReportSink {
    async fn submit(&self, submission: &Submission) -> Result<(), ReportError> {
        log_completed(submission);
        Ok(())
    }
}

/// Posts each submission as JSON to an external endpoint, once
pub struct WebhookReportSink {
    client: reqwest::Client,
    url: String,
}

impl WebhookReportSink {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, ReportError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    async fn forward(&self, submission: &Submission) -> Result<(), ReportError> {
        let response = self.client.post(&self.url).json(submission).send().await?;
        if !response.status().is_success() {
            return Err(ReportError::HttpStatus(response.status().as_u16()));
        }
        Ok(())
    }
}

#[async_trait]
impl ReportSink for WebhookReportSink {
    /// Logged as completed only once the endpoint accepted it
    async fn submit(&self, submission: &Submission) -> Result<(), ReportError> {
        if let Err(e) = self.forward(submission).await {
            tracing::warn!(
                submission_id = %submission.id,
                sender_id = %submission.sender_id,
                error = %e,
                "Report forwarding failed"
            );
            return Err(e);
        }
        log_completed(submission);
        Ok(())
    }
}
