//! Public file store backed by S3 (MinIO locally). Entity rows keep the returned URLs.

use std::collections::HashMap;

use async_trait::async_trait;
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use aws_sdk_s3::primitives::ByteStream;
use axum::extract::Multipart;
use bytes::Bytes;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::Config;
use crate::errors::AppError;

/// Object storage holding uploaded files. Keys are produced by `object_key`.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Uploads `bytes` under `key` and returns the public URL.
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<String, AppError>;
    async fn delete(&self, key: &str) -> Result<(), AppError>;
}

#[derive(Clone)]
pub struct FileStore {
    client: aws_sdk_s3::Client,
    bucket: String,
    public_base_url: String,
}

impl FileStore {
    /// Builds an S3 client configured for MinIO (local) or AWS (production).
    pub async fn from_config(config: &Config) -> Self {
        let credentials = Credentials::new(
            &config.aws_access_key_id,
            &config.aws_secret_access_key,
            None,
            None,
            "jobboard-static",
        );

        let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .credentials_provider(credentials)
            .endpoint_url(&config.s3_endpoint)
            .load()
            .await;

        Self {
            client: aws_sdk_s3::Client::new(&s3_config),
            bucket: config.s3_bucket.clone(),
            public_base_url: config.public_file_base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl ObjectStore for FileStore {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<String, AppError> {
        let size = bytes.len();
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(bytes))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("S3 upload of {key} failed: {e}")))?;

        info!("Uploaded {size} bytes to s3://{}/{}", self.bucket, key);
        Ok(public_url(&self.public_base_url, key))
    }

    async fn delete(&self, key: &str) -> Result<(), AppError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("S3 delete of {key} failed: {e}")))?;

        debug!("Deleted s3://{}/{}", self.bucket, key);
        Ok(())
    }
}

/// A file part received in a multipart form.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: Option<String>,
    pub content_type: String,
    pub bytes: Bytes,
}

/// Text fields and file parts of a multipart body, keyed by field name.
#[derive(Debug, Default)]
pub struct MultipartForm {
    pub fields: HashMap<String, String>,
    pub files: HashMap<String, UploadedFile>,
}

impl MultipartForm {
    pub async fn read(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut form = MultipartForm::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::Validation(format!("Malformed multipart body: {e}")))?
        {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };
            if field.file_name().is_some() {
                let file_name = field.file_name().map(str::to_string);
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(format!("Could not read '{name}': {e}")))?;
                form.files.insert(
                    name,
                    UploadedFile {
                        file_name,
                        content_type,
                        bytes,
                    },
                );
            } else {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::Validation(format!("Could not read '{name}': {e}")))?;
                form.fields.insert(name, text);
            }
        }
        Ok(form)
    }

    pub fn text(&self, name: &str) -> Result<&str, AppError> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| AppError::Validation(format!("Missing field '{name}'")))
    }

    /// Parses a required text field.
    pub fn parse<T: std::str::FromStr>(&self, name: &str) -> Result<T, AppError> {
        self.text(name)?
            .parse()
            .map_err(|_| AppError::Validation(format!("Field '{name}' is not valid")))
    }

    pub fn take_file(&mut self, name: &str) -> Option<UploadedFile> {
        self.files.remove(name).filter(|f| !f.bytes.is_empty())
    }
}

pub fn public_url(base: &str, key: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), key.trim_start_matches('/'))
}

/// Builds a unique object key, keeping a sanitized extension from the client file name.
pub fn object_key(prefix: &str, file_name: Option<&str>) -> String {
    let ext = file_name
        .and_then(|n| n.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty() && ext.len() <= 8 && ext.chars().all(|c| c.is_ascii_alphanumeric()));
    match ext {
        Some(ext) => format!("{}/{}.{}", prefix.trim_end_matches('/'), Uuid::new_v4(), ext),
        None => format!("{}/{}", prefix.trim_end_matches('/'), Uuid::new_v4()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_form_field_helpers() {
        let mut form = MultipartForm::default();
        form.fields.insert("job_id".to_string(), format!(" {} ", Uuid::nil()));
        form.fields.insert("index".to_string(), "x".to_string());
        form.files.insert(
            "resume".to_string(),
            UploadedFile {
                file_name: Some("cv.pdf".to_string()),
                content_type: "application/pdf".to_string(),
                bytes: Bytes::new(),
            },
        );

        assert_eq!(form.parse::<Uuid>("job_id").unwrap(), Uuid::nil());
        assert!(form.parse::<u32>("index").is_err());
        assert!(form.text("total").is_err());
        // Empty file parts count as absent.
        assert!(form.take_file("resume").is_none());
    }

    #[test]
    fn test_public_url_joins_cleanly() {
        assert_eq!(
            public_url("http://minio:9000/files/", "/resumes/a.pdf"),
            "http://minio:9000/files/resumes/a.pdf"
        );
    }

    #[test]
    fn test_object_key_keeps_safe_extension() {
        let key = object_key("resumes/job-1", Some("My CV.PDF"));
        assert!(key.starts_with("resumes/job-1/"));
        assert!(key.ends_with(".pdf"));
    }

    #[test]
    fn test_object_key_drops_suspicious_extension() {
        let key = object_key("videos", Some("clip.mp4/../../etc"));
        assert!(!key.contains(".."));
        let key = object_key("videos", None);
        assert!(!key.contains('.'));
    }
}
