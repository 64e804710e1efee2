//! Chunked upload staging.
//!
//! Parts land at `{root}/{seeker}_{job}/{kind}/{index:05}.part`. Each part is
//! written to a scratch file and renamed into place, so retrying an index
//! replaces the whole part. Assembly refuses to run while any index is missing.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Deserialize;
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::errors::AppError;

pub const MAX_TOTAL_CHUNKS: u32 = 1000;
pub const MAX_RESUME_BYTES: u64 = 10 * 1024 * 1024;
pub const MAX_VIDEO_BYTES: u64 = 64 * 1024 * 1024;
const TOTAL_FILE: &str = ".total";

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("invalid chunk: {0}")]
    InvalidChunk(String),

    #[error("chunk total {given} does not match {expected} from earlier parts")]
    TotalMismatch { expected: u32, given: u32 },

    #[error("no parts uploaded for this file")]
    NothingUploaded,

    #[error("missing parts: {0:?}")]
    MissingParts(Vec<u32>),

    #[error("{kind} is {size} bytes, over the {limit} byte limit")]
    TooLarge {
        kind: &'static str,
        size: u64,
        limit: u64,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<UploadError> for AppError {
    fn from(err: UploadError) -> Self {
        match err {
            UploadError::InvalidChunk(msg) => AppError::Validation(msg),
            err @ UploadError::TooLarge { .. } => AppError::Validation(err.to_string()),
            UploadError::Io(e) => AppError::Internal(anyhow::Error::new(e).context("upload staging")),
            other => AppError::UnprocessableEntity(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadKind {
    Resume,
    Video,
}

impl UploadKind {
    pub fn as_str(self) -> &'static str {
        match self {
            UploadKind::Resume => "resume",
            UploadKind::Video => "video",
        }
    }

    /// Largest file accepted for this kind, whether sent whole or in chunks.
    pub fn max_bytes(self) -> u64 {
        match self {
            UploadKind::Resume => MAX_RESUME_BYTES,
            UploadKind::Video => MAX_VIDEO_BYTES,
        }
    }

    /// Object store folder under `applications/{job}`.
    pub fn folder(self) -> &'static str {
        match self {
            UploadKind::Resume => "resumes",
            UploadKind::Video => "videos",
        }
    }
}

impl FromStr for UploadKind {
    type Err = UploadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "resume" => Ok(UploadKind::Resume),
            "video" => Ok(UploadKind::Video),
            other => Err(UploadError::InvalidChunk(format!("unknown upload kind '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadKey {
    pub seeker_id: Uuid,
    pub job_id: Uuid,
    pub kind: UploadKind,
}

#[derive(Debug, Clone)]
pub struct ChunkStore {
    root: PathBuf,
}

impl ChunkStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn upload_dir(&self, seeker_id: Uuid, job_id: Uuid) -> PathBuf {
        self.root.join(format!("{seeker_id}_{job_id}"))
    }

    fn kind_dir(&self, key: &UploadKey) -> PathBuf {
        self.upload_dir(key.seeker_id, key.job_id).join(key.kind.as_str())
    }

    /// Stores one part. Returns how many distinct parts are now present.
    pub async fn write_chunk(
        &self,
        key: &UploadKey,
        index: u32,
        total: u32,
        bytes: &[u8],
    ) -> Result<u32, UploadError> {
        if total == 0 || total > MAX_TOTAL_CHUNKS {
            return Err(UploadError::InvalidChunk(format!(
                "total must be between 1 and {MAX_TOTAL_CHUNKS}, got {total}"
            )));
        }
        if index >= total {
            return Err(UploadError::InvalidChunk(format!(
                "index {index} out of range for total {total}"
            )));
        }

        let dir = self.kind_dir(key);
        fs::create_dir_all(&dir).await?;

        claim_total(&dir, total).await?;

        let scratch = dir.join(format!("{index:05}.{}.tmp", Uuid::new_v4().simple()));
        fs::write(&scratch, bytes).await?;
        fs::rename(&scratch, part_path(&dir, index)).await?;
        debug!(
            "Stored part {index}/{total} ({} bytes) of {} for job {}",
            bytes.len(),
            key.kind.as_str(),
            key.job_id
        );

        Ok(total - missing_parts(&dir, total).await?.len() as u32)
    }

    /// Concatenates every part in index order. `Ok(None)` when nothing was uploaded.
    /// Parts adding up to more than `limit` bytes are rejected before any is read.
    pub async fn assemble(&self, key: &UploadKey, limit: u64) -> Result<Option<Vec<u8>>, UploadError> {
        let dir = self.kind_dir(key);
        let Some(total) = read_total(&dir).await? else {
            return Ok(None);
        };

        let missing = missing_parts(&dir, total).await?;
        if !missing.is_empty() {
            return Err(UploadError::MissingParts(missing));
        }

        let mut size = 0u64;
        for index in 0..total {
            size += fs::metadata(part_path(&dir, index)).await?.len();
        }
        if size > limit {
            return Err(UploadError::TooLarge {
                kind: key.kind.as_str(),
                size,
                limit,
            });
        }

        let mut assembled = Vec::new();
        for index in 0..total {
            assembled.extend_from_slice(&fs::read(part_path(&dir, index)).await?);
        }
        info!(
            "Assembled {} parts ({} bytes) of {} for job {}",
            total,
            assembled.len(),
            key.kind.as_str(),
            key.job_id
        );
        Ok(Some(assembled))
    }

    /// Like `assemble`, but a file with no parts is an error.
    pub async fn assemble_required(&self, key: &UploadKey, limit: u64) -> Result<Vec<u8>, UploadError> {
        self.assemble(key, limit).await?.ok_or(UploadError::NothingUploaded)
    }

    /// Removes every staged part for the seeker's upload to `job_id`.
    pub async fn discard(&self, seeker_id: Uuid, job_id: Uuid) {
        let dir = self.upload_dir(seeker_id, job_id);
        match fs::remove_dir_all(&dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!("Could not remove upload staging dir {}: {e}", dir.display()),
        }
    }
}

fn part_path(dir: &Path, index: u32) -> PathBuf {
    dir.join(format!("{index:05}.part"))
}

/// Records the declared total for a new upload, or checks it against the recorded one.
/// The value is published with a hard link, so exactly one writer wins and
/// readers never see a partially written file.
async fn claim_total(dir: &Path, total: u32) -> Result<(), UploadError> {
    let scratch = dir.join(format!("{TOTAL_FILE}.{}.tmp", Uuid::new_v4().simple()));
    fs::write(&scratch, total.to_string()).await?;
    let linked = fs::hard_link(&scratch, dir.join(TOTAL_FILE)).await;
    fs::remove_file(&scratch).await?;

    match linked {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::AlreadyExists => match read_total(dir).await? {
            Some(expected) if expected != total => Err(UploadError::TotalMismatch {
                expected,
                given: total,
            }),
            _ => Ok(()),
        },
        Err(e) => Err(e.into()),
    }
}

async fn read_total(dir: &Path) -> Result<Option<u32>, UploadError> {
    match fs::read_to_string(dir.join(TOTAL_FILE)).await {
        Ok(raw) => raw
            .trim()
            .parse::<u32>()
            .map(Some)
            .map_err(|_| UploadError::InvalidChunk("corrupt upload state".to_string())),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

async fn missing_parts(dir: &Path, total: u32) -> Result<Vec<u32>, UploadError> {
    let mut missing = Vec::new();
    for index in 0..total {
        if !fs::try_exists(part_path(dir, index)).await? {
            missing.push(index);
        }
    }
    Ok(missing)
}
