//! Drop-zone uploader - pushes dropped image batches to a hosted image service
//!
//! A batch of files arrives from a drop event, each file is uploaded to the remote
//! service, and the controller publishes per-file loading flags plus preview URLs
//! for every upload that completes.

pub mod controller;
pub mod error;
pub mod mime;
pub mod models;
pub mod upload;

pub use error::{Error, Result, UploadError, UploadErrorKind};
