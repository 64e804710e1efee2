use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::applications::repository::ApplicationRepository;
use crate::applications::upload::{ChunkStore, UploadKey, UploadKind};
use crate::errors::AppError;
use crate::models::account::{AccountKind, EmployerRow, Party, SeekerRow};
use crate::models::application::{ApplicationRow, ApplicationStatus, NewApplication};
use crate::models::job::JobRow;
use crate::notify::{Dispatcher, Event};
use crate::repository::RepositoryError;
use crate::storage::{object_key, ObjectStore};

/// Stored artifact URLs attached at apply time.
#[derive(Debug, Clone, Default)]
pub struct ApplicationFiles {
    pub resume_url: Option<String>,
    pub video_url: Option<String>,
}

/// A file to store alongside a new application.
#[derive(Debug, Clone)]
pub struct Attachment {
    pub kind: UploadKind,
    pub file_name: Option<String>,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl Attachment {
    /// An assembled chunked upload; the content type comes from the file name.
    pub fn staged(kind: UploadKind, file_name: Option<&str>, bytes: Vec<u8>) -> Self {
        Self {
            kind,
            file_name: file_name.map(str::to_string),
            content_type: content_type_for(file_name).to_string(),
            bytes,
        }
    }

    fn check_size(&self) -> Result<(), AppError> {
        let limit = self.kind.max_bytes();
        if self.bytes.len() as u64 > limit {
            return Err(AppError::Validation(format!(
                "The {} exceeds the {}MB limit",
                self.kind.as_str(),
                limit / (1024 * 1024)
            )));
        }
        Ok(())
    }
}

pub fn content_type_for(file_name: Option<&str>) -> &'static str {
    let ext = file_name
        .and_then(|n| n.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase());
    match ext.as_deref() {
        Some("pdf") => "application/pdf",
        Some("doc") => "application/msword",
        Some("docx") => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        Some("mp4") => "video/mp4",
        Some("webm") => "video/webm",
        Some("mov") => "video/quicktime",
        _ => "application/octet-stream",
    }
}

fn already_applied(job: &JobRow) -> AppError {
    AppError::Conflict(format!("You have already applied to '{}'", job.title))
}

/// True for the applicant and for the employer that owns the job.
pub fn can_view(application: &ApplicationRow, job: &JobRow, viewer: Party) -> bool {
    match viewer.kind {
        AccountKind::Seeker => application.seeker_id == viewer.id,
        AccountKind::Employer => job.id == application.job_id && job.employer_id == viewer.id,
        AccountKind::Admin => true,
    }
}

#[derive(Clone)]
pub struct ApplicationService {
    repo: Arc<dyn ApplicationRepository>,
    dispatcher: Arc<Dispatcher>,
    files: Arc<dyn ObjectStore>,
}

impl ApplicationService {
    pub fn new(
        repo: Arc<dyn ApplicationRepository>,
        dispatcher: Arc<Dispatcher>,
        files: Arc<dyn ObjectStore>,
    ) -> Self {
        Self {
            repo,
            dispatcher,
            files,
        }
    }

    /// Fails with 409 when the seeker's email already applied to the job.
    pub async fn ensure_not_applied(&self, job: &JobRow, seeker: &SeekerRow) -> Result<(), AppError> {
        if self.repo.exists(job.id, &seeker.email).await? {
            return Err(already_applied(job));
        }
        Ok(())
    }

    /// Creates a pending application carrying a snapshot of the seeker's profile.
    pub async fn apply(
        &self,
        job: &JobRow,
        seeker: &SeekerRow,
        files: ApplicationFiles,
    ) -> Result<ApplicationRow, AppError> {
        let application = self
            .repo
            .insert(NewApplication {
                job_id: job.id,
                seeker_id: seeker.id,
                name: seeker.name.clone(),
                email: seeker.email.clone(),
                phone: seeker.phone.clone(),
                qualification: seeker.qualification.clone(),
                experience_level: seeker.experience_level.clone(),
                education_level: seeker.education_level.clone(),
                resume_url: files.resume_url,
                video_url: files.video_url,
            })
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict => already_applied(job),
                other => other.into(),
            })?;

        info!("Seeker {} applied to job {} ({})", seeker.id, job.id, application.id);
        Ok(application)
    }

    /// Stores the attachments, then applies. If any step fails, objects
    /// stored by this call are deleted again.
    pub async fn apply_with_attachments(
        &self,
        job: &JobRow,
        seeker: &SeekerRow,
        attachments: Vec<Attachment>,
    ) -> Result<ApplicationRow, AppError> {
        self.ensure_not_applied(job, seeker).await?;
        for attachment in &attachments {
            attachment.check_size()?;
        }

        let mut stored = Vec::new();
        let result = self
            .store_and_apply(job, seeker, attachments, &mut stored)
            .await;
        if result.is_err() {
            self.remove_objects(&stored).await;
        }
        result
    }

    /// Assembles the seeker's staged resume (required) and video (optional)
    /// and applies with them. Staged parts are discarded only once the
    /// application exists, so a failed attempt can be completed again.
    pub async fn apply_from_staged(
        &self,
        chunks: &ChunkStore,
        job: &JobRow,
        seeker: &SeekerRow,
        resume_name: Option<&str>,
        video_name: Option<&str>,
    ) -> Result<ApplicationRow, AppError> {
        self.ensure_not_applied(job, seeker).await?;

        let key = |kind| UploadKey {
            seeker_id: seeker.id,
            job_id: job.id,
            kind,
        };
        let resume = chunks
            .assemble_required(&key(UploadKind::Resume), UploadKind::Resume.max_bytes())
            .await?;
        let mut attachments = vec![Attachment::staged(UploadKind::Resume, resume_name, resume)];
        if let Some(video) = chunks
            .assemble(&key(UploadKind::Video), UploadKind::Video.max_bytes())
            .await?
        {
            attachments.push(Attachment::staged(UploadKind::Video, video_name, video));
        }

        let application = self.apply_with_attachments(job, seeker, attachments).await?;
        chunks.discard(seeker.id, job.id).await;
        Ok(application)
    }

    async fn store_and_apply(
        &self,
        job: &JobRow,
        seeker: &SeekerRow,
        attachments: Vec<Attachment>,
        stored: &mut Vec<String>,
    ) -> Result<ApplicationRow, AppError> {
        let mut files = ApplicationFiles::default();
        for attachment in attachments {
            let prefix = format!("applications/{}/{}", job.id, attachment.kind.folder());
            let key = object_key(&prefix, attachment.file_name.as_deref());
            let url = self
                .files
                .put(&key, attachment.bytes, &attachment.content_type)
                .await?;
            stored.push(key);
            match attachment.kind {
                UploadKind::Resume => files.resume_url = Some(url),
                UploadKind::Video => files.video_url = Some(url),
            }
        }
        self.apply(job, seeker, files).await
    }

    async fn remove_objects(&self, keys: &[String]) {
        for key in keys {
            if let Err(e) = self.files.delete(key).await {
                warn!("Could not remove orphaned upload {key}: {e}");
            }
        }
    }

    pub async fn get(&self, id: Uuid) -> Result<ApplicationRow, AppError> {
        self.repo
            .fetch(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Application {id} not found")))
    }

    pub async fn for_seeker(&self, seeker_id: Uuid) -> Result<Vec<ApplicationRow>, AppError> {
        Ok(self.repo.for_seeker(seeker_id).await?)
    }

    pub async fn for_job(
        &self,
        job: &JobRow,
        employer_id: Uuid,
        status: Option<ApplicationStatus>,
    ) -> Result<Vec<ApplicationRow>, AppError> {
        if job.employer_id != employer_id {
            return Err(AppError::Forbidden);
        }
        Ok(self.repo.for_job(job.id, status).await?)
    }

    /// Sets any status (no transition rules) and fans out the change to the applicant.
    pub async fn update_status(
        &self,
        application_id: Uuid,
        job: &JobRow,
        employer: &EmployerRow,
        status: ApplicationStatus,
    ) -> Result<ApplicationRow, AppError> {
        if job.employer_id != employer.id {
            return Err(AppError::Forbidden);
        }

        let application = self
            .repo
            .update_status(application_id, job.id, status)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "Application {application_id} not found for job {}",
                    job.id
                ))
            })?;

        info!("Application {application_id} set to {status} by employer {}", employer.id);

        self.dispatcher
            .dispatch(Event::StatusChanged {
                application: application.clone(),
                job_title: job.title.clone(),
                employer_name: employer.org_name.clone(),
            })
            .await?;

        Ok(application)
    }
}
