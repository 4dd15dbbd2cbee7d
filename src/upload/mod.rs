//! Single-file uploads to the hosted image service
//!
//! Each upload is bound to a batch's cancellation token so a superseded batch
//! can abandon its in-flight request.

pub mod client;
pub mod mock;
pub mod token;

pub use client::CloudinaryClient;
pub use mock::{MockResponse, MockUploadClient};
pub use token::CancelToken;

use crate::models::{DroppedFile, FileTicket, UploadResult};
use crate::UploadError;
use async_trait::async_trait;

#[async_trait]
pub trait UploadService: Send + Sync {
    /// Upload one file. Exactly one attempt is made.
    async fn upload(
        &self,
        file: &DroppedFile,
        ticket: FileTicket,
        token: &CancelToken,
    ) -> std::result::Result<UploadResult, UploadError>;
}
