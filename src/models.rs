//! Data models and structures
//!
//! Defines dropped files, upload results, the hosted service's response shape,
//! and the environment-driven configuration.

use crate::mime::detect_image_mime;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A file delivered by a drop event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedFile {
    pub name: String,
    pub data: Vec<u8>,
    pub content_type: String,
}

impl DroppedFile {
    pub fn new(name: impl Into<String>, data: Vec<u8>) -> Self {
        let content_type = detect_image_mime(&data).to_string();
        Self {
            name: name.into(),
            data,
            content_type,
        }
    }

    pub async fn from_path(path: &Path) -> Result<Self> {
        let data = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| Error::Generic(format!("Not a file path: {}", path.display())))?;
        Ok(Self::new(name, data))
    }
}

/// Position of a file inside a specific batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileTicket {
    pub generation: u64,
    pub index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadResult {
    pub index: usize,
    pub file_name: String,
    pub secure_url: String,
    pub preview_url: String,
}

#[derive(Debug, Deserialize)]
pub struct UploadResponse {
    pub secure_url: String,
}

/// Rewrites a hosted URL so the service serves a width-constrained rendition.
pub fn preview_url(secure_url: &str, width: u32) -> String {
    secure_url.replacen("/upload/", &format!("/upload/w_{}/", width), 1)
}

// Configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub cloud_name: String,
    pub upload_preset: String,
    pub upload_tag: String,
    pub api_base: String,
    pub preview_width: u32,
    pub timeout_secs: u64,
    pub concurrency: Option<usize>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        match dotenvy::dotenv() {
            Err(e) if !e.not_found() => return Err(e.into()),
            _ => {}
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.is_empty())
                .ok_or_else(|| Error::Config(format!("{} not set", key)))
        };

        Ok(Self {
            cloud_name: required("CLOUD_NAME")?,
            upload_preset: required("UPLOAD_PRESET")?,
            upload_tag: lookup("UPLOAD_TAG")
                .unwrap_or_else(|| "myphotoalbum-react".to_string()),
            api_base: lookup("UPLOAD_API_BASE")
                .unwrap_or_else(|| "https://api.cloudinary.com".to_string()),
            preview_width: parse_var(&lookup, "PREVIEW_WIDTH")?.unwrap_or(400),
            timeout_secs: parse_var(&lookup, "UPLOAD_TIMEOUT_SECS")?.unwrap_or(60),
            concurrency: parse_var(&lookup, "UPLOAD_CONCURRENCY")?,
        })
    }

    pub fn upload_url(&self) -> String {
        format!(
            "{}/v1_1/{}/upload",
            self.api_base.trim_end_matches('/'),
            self.cloud_name
        )
    }
}

fn parse_var<F, T>(lookup: &F, key: &str) -> Result<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| Error::Config(format!("{} has invalid value '{}'", key, raw))),
        None => Ok(None),
    }
}
