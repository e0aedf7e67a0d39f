//! Attachment staging — media-type/size policy and storage handles.
//!
//! The stager enforces policy before any byte touches storage, so a rejected
//! upload leaves the staging directory untouched. Staged temp files are NOT
//! deleted here: the submission processor owns deletion, which keeps a single
//! cleanup path no matter which downstream step fails.

use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::config::{IntakeConfig, StagingPolicy};
use crate::error::{AttachmentError, CleanupError};

/// An uploaded file as decoded from the multipart body, before policy checks.
#[derive(Debug, Clone)]
pub struct Upload {
    /// Original file name as sent by the browser. Untrusted — used only for
    /// display and as the outbound attachment name, never as a storage path.
    pub file_name: String,
    /// Declared media type from the multipart part.
    pub media_type: String,
    pub bytes: Vec<u8>,
}

/// Where the staged bytes live until dispatch settles.
#[derive(Debug)]
pub enum StorageHandle {
    Memory(Vec<u8>),
    TempFile(PathBuf),
}

/// A policy-checked attachment ready for composition and dispatch.
#[derive(Debug)]
pub struct StagedAttachment {
    pub file_name: String,
    pub media_type: String,
    pub size: u64,
    pub handle: StorageHandle,
}

impl StagedAttachment {
    /// The temp-file path backing this attachment, if disk-staged.
    pub fn staged_path(&self) -> Option<&Path> {
        match &self.handle {
            StorageHandle::Memory(_) => None,
            StorageHandle::TempFile(path) => Some(path),
        }
    }

    /// Read the attachment bytes for dispatch.
    pub async fn contents(&self) -> std::io::Result<Vec<u8>> {
        match &self.handle {
            StorageHandle::Memory(bytes) => Ok(bytes.clone()),
            StorageHandle::TempFile(path) => tokio::fs::read(path).await,
        }
    }

    /// Release any backing storage. Consumes the attachment, so release runs
    /// at most once per submission.
    pub async fn discard(self) -> Result<(), CleanupError> {
        match self.handle {
            StorageHandle::Memory(_) => Ok(()),
            StorageHandle::TempFile(path) => tokio::fs::remove_file(&path)
                .await
                .map_err(|source| CleanupError { path, source }),
        }
    }
}

/// Check an upload against the configured policy and stage it.
///
/// Fails with `UnsupportedType` or `TooLarge` before any filesystem access;
/// disk staging failures surface as `Storage`.
pub async fn stage(
    upload: Upload,
    config: &IntakeConfig,
) -> Result<StagedAttachment, AttachmentError> {
    if !config
        .allowed_media_types
        .iter()
        .any(|t| t.eq_ignore_ascii_case(&upload.media_type))
    {
        return Err(AttachmentError::UnsupportedType(upload.media_type));
    }

    let size = upload.bytes.len() as u64;
    if size > config.max_attachment_bytes {
        return Err(AttachmentError::TooLarge {
            size,
            limit: config.max_attachment_bytes,
        });
    }

    let handle = match &config.staging {
        StagingPolicy::Memory => StorageHandle::Memory(upload.bytes),
        StagingPolicy::Disk { dir } => {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| AttachmentError::Storage(e.to_string()))?;

            let path = dir.join(staged_file_name(&upload.file_name));
            tokio::fs::write(&path, &upload.bytes)
                .await
                .map_err(|e| AttachmentError::Storage(e.to_string()))?;
            StorageHandle::TempFile(path)
        }
    };

    Ok(StagedAttachment {
        file_name: upload.file_name,
        media_type: upload.media_type,
        size,
        handle,
    })
}

/// Derive a collision-free staged name: random UUID plus the original
/// extension. The original name never contributes to the path, so concurrent
/// submissions of `resume.pdf` cannot interfere.
fn staged_file_name(original: &str) -> String {
    match Path::new(original).extension().and_then(|e| e.to_str()) {
        Some(ext) if !ext.is_empty() => format!("{}.{ext}", Uuid::new_v4()),
        _ => Uuid::new_v4().to_string(),
    }
}
