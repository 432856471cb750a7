use crate::http::build_client;
use crate::models::{SubmissionPayload, SubmissionReceipt};
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

/// The order-intake collaborator: receives the finished submission payload
/// and answers with a request identifier. Without a configured endpoint it
/// fabricates a receipt so the flow completes offline.
#[derive(Debug, Clone)]
pub struct OrderIntakeClient {
    base_url: Option<String>,
    api_key: Option<String>,
    http: Client,
}

#[derive(Debug, Error)]
pub enum OrderIntakeError {
    #[error("request failed: {0}")]
    Request(String),
    #[error("invalid response: {0}")]
    Deserialize(String),
}

#[derive(Debug, Deserialize)]
struct IntakeResponse {
    request_id: String,
}

impl OrderIntakeClient {
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("ORDER_INTAKE_URL")
                .ok()
                .map(|url| url.trim_end_matches('/').to_string())
                .filter(|url| !url.is_empty()),
            api_key: std::env::var("ORDER_INTAKE_KEY").ok().filter(|key| !key.is_empty()),
            http: build_client(),
        }
    }

    pub async fn submit(
        &self,
        payload: &SubmissionPayload,
    ) -> Result<SubmissionReceipt, OrderIntakeError> {
        let Some(base) = &self.base_url else {
            info!(
                target = "porter.orders",
                draft = %payload.draft_id,
                "no order intake configured; issuing demo receipt"
            );
            return Ok(SubmissionReceipt {
                request_id: format!("REQ-{}", Uuid::new_v4().simple()),
                item_count: payload.items.len(),
                submitted_at: Utc::now(),
            });
        };

        let url = format!("{base}/v1/purchase-requests");
        let mut request = self.http.post(url).json(payload);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let response = request
            .send()
            .await
            .map_err(|err| OrderIntakeError::Request(err.to_string()))?;
        if !response.status().is_success() {
            return Err(OrderIntakeError::Request(format!(
                "HTTP {}",
                response.status()
            )));
        }
        let body: IntakeResponse = response
            .json()
            .await
            .map_err(|err| OrderIntakeError::Deserialize(err.to_string()))?;
        info!(
            target = "porter.orders",
            draft = %payload.draft_id,
            request_id = %body.request_id,
            "draft submitted"
        );
        Ok(SubmissionReceipt {
            request_id: body.request_id,
            item_count: payload.items.len(),
            submitted_at: Utc::now(),
        })
    }
}
