use super::{CancelToken, UploadService};
use crate::models::{preview_url, DroppedFile, FileTicket, UploadResult};
use crate::UploadError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Notify;

#[derive(Debug, Clone)]
pub enum MockResponse {
    Success(String),
    Status(u16),
    Failure(String),
}

/// Scripted upload service keyed by file name.
///
/// Files without a scripted response succeed with a URL under the mock's base.
/// A gated file holds its request open until [`MockUploadClient::release`].
#[derive(Clone)]
pub struct MockUploadClient {
    responses: Arc<Mutex<HashMap<String, MockResponse>>>,
    gates: Arc<Mutex<HashMap<String, Arc<Notify>>>>,
    base_url: String,
    preview_width: u32,
    honor_cancellation: bool,
    upload_count: Arc<Mutex<usize>>,
    uploaded: Arc<Mutex<Vec<String>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MockUploadClient {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(HashMap::new())),
            gates: Arc::new(Mutex::new(HashMap::new())),
            base_url: "https://res.example.com/upload".to_string(),
            preview_width: 400,
            honor_cancellation: true,
            upload_count: Arc::new(Mutex::new(0)),
            uploaded: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_response(self, file_name: &str, response: MockResponse) -> Self {
        lock(&self.responses).insert(file_name.to_string(), response);
        self
    }

    pub fn with_gate(self, file_name: &str) -> Self {
        lock(&self.gates).insert(file_name.to_string(), Arc::new(Notify::new()));
        self
    }

    /// Keep gated requests open even after their token is cancelled, the way a
    /// response that already left the server still arrives.
    pub fn ignoring_cancellation(mut self) -> Self {
        self.honor_cancellation = false;
        self
    }

    pub fn release(&self, file_name: &str) {
        if let Some(gate) = lock(&self.gates).get(file_name) {
            gate.notify_one();
        }
    }

    pub fn get_upload_count(&self) -> usize {
        *lock(&self.upload_count)
    }

    /// File names in the order their uploads started.
    pub fn get_uploaded(&self) -> Vec<String> {
        lock(&self.uploaded).clone()
    }
}

impl Default for MockUploadClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UploadService for MockUploadClient {
    async fn upload(
        &self,
        file: &DroppedFile,
        ticket: FileTicket,
        token: &CancelToken,
    ) -> std::result::Result<UploadResult, UploadError> {
        if token.is_cancelled() {
            return Err(UploadError::Aborted);
        }

        *lock(&self.upload_count) += 1;
        lock(&self.uploaded).push(file.name.clone());

        let gate = lock(&self.gates).get(&file.name).cloned();
        if let Some(gate) = gate {
            if self.honor_cancellation {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => return Err(UploadError::Aborted),
                    _ = gate.notified() => {}
                }
            } else {
                gate.notified().await;
            }
        }

        let response = lock(&self.responses)
            .get(&file.name)
            .cloned()
            .unwrap_or_else(|| MockResponse::Success(format!("{}/{}", self.base_url, file.name)));

        match response {
            MockResponse::Success(secure_url) => Ok(UploadResult {
                index: ticket.index,
                file_name: file.name.clone(),
                preview_url: preview_url(&secure_url, self.preview_width),
                secure_url,
            }),
            MockResponse::Status(status) => Err(UploadError::UploadRejected {
                status,
                body: "mock rejection".to_string(),
            }),
            MockResponse::Failure(message) => Err(UploadError::UploadFailed(message)),
        }
    }
}
