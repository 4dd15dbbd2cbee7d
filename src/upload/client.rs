use super::{CancelToken, UploadService};
use crate::models::{preview_url, Config, DroppedFile, FileTicket, UploadResponse, UploadResult};
use crate::{Result, UploadError};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use std::time::Duration;

type UploadOutcome = std::result::Result<UploadResult, UploadError>;

/// Unsigned preset uploads against the hosted image service's REST endpoint.
pub struct CloudinaryClient {
    client: Client,
    upload_url: String,
    upload_preset: String,
    upload_tag: String,
    preview_width: u32,
}

impl CloudinaryClient {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self::new_with_client(config, client))
    }

    pub fn new_with_client(config: &Config, client: Client) -> Self {
        Self {
            client,
            upload_url: config.upload_url(),
            upload_preset: config.upload_preset.clone(),
            upload_tag: config.upload_tag.clone(),
            preview_width: config.preview_width,
        }
    }

    fn build_form(&self, file: &DroppedFile) -> std::result::Result<Form, UploadError> {
        let part = Part::bytes(file.data.clone())
            .file_name(file.name.clone())
            .mime_str(&file.content_type)?;

        Ok(Form::new()
            .part("file", part)
            .text("upload_preset", self.upload_preset.clone())
            .text("tags", self.upload_tag.clone())
            .text("multiple", "true")
            .text("resource_type", "image"))
    }

    async fn send(&self, file: &DroppedFile, ticket: FileTicket) -> UploadOutcome {
        let form = self.build_form(file)?;
        let response = self
            .client
            .post(&self.upload_url)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UploadError::UploadRejected {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        let parsed: UploadResponse = serde_json::from_str(&body).map_err(|e| {
            UploadError::UploadFailed(format!("Failed to parse upload response: {}", e))
        })?;

        Ok(UploadResult {
            index: ticket.index,
            file_name: file.name.clone(),
            preview_url: preview_url(&parsed.secure_url, self.preview_width),
            secure_url: parsed.secure_url,
        })
    }
}

#[async_trait]
impl UploadService for CloudinaryClient {
    async fn upload(
        &self,
        file: &DroppedFile,
        ticket: FileTicket,
        token: &CancelToken,
    ) -> UploadOutcome {
        if token.is_cancelled() {
            return Err(UploadError::Aborted);
        }

        // Losing the race drops the request future, which closes the connection.
        tokio::select! {
            biased;
            _ = token.cancelled() => Err(UploadError::Aborted),
            outcome = self.send(file, ticket) => outcome,
        }
    }
}
