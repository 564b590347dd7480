use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::models::Pipeline;

use super::{NotificationKind, Notifier, NotifyError};

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Serialize)]
struct WebhookBody<'a> {
    kind: NotificationKind,
    pipeline_id: Uuid,
    employer_id: Uuid,
    job_title: &'a str,
    payload: &'a Value,
}

/// POSTs every notification as JSON to one configured endpoint.
/// Email rendering and delivery happen on the receiving side.
#[derive(Clone)]
pub struct WebhookNotifier {
    client: Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: String) -> Result<Self, NotifyError> {
        Ok(Self {
            client: Client::builder().timeout(WEBHOOK_TIMEOUT).build()?,
            url,
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(
        &self,
        pipeline: &Pipeline,
        kind: NotificationKind,
        payload: &Value,
    ) -> Result<(), NotifyError> {
        let body = WebhookBody {
            kind,
            pipeline_id: pipeline.id,
            employer_id: pipeline.employer_id,
            job_title: &pipeline.job.title,
            payload,
        };

        let response = self.client.post(&self.url).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Rejected(status.as_u16()));
        }

        debug!("Webhook accepted {} for pipeline {}", kind.as_str(), pipeline.id);
        Ok(())
    }
}
