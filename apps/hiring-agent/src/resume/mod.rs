//! Resume intake: validate an uploaded file, extract its text, identify the
//! candidate, store the original, and upsert the pipeline entry.

pub mod storage;

use std::sync::{Arc, LazyLock};

use bytes::Bytes;
use regex::Regex;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::PipelineCandidate;
use crate::repository::{PipelineRepository, RepoError, ResumeUpload};

pub use storage::{ResumeStorage, S3ResumeStorage, StorageError};

static RE_EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[a-zA-Z0-9._%+\-]+@[a-zA-Z0-9.\-]+\.[a-zA-Z]{2,}").unwrap()
});

#[derive(Debug, Error)]
pub enum IntakeError {
    #[error("{filename}: file is {size} bytes, limit is {max}")]
    TooLarge {
        filename: String,
        size: usize,
        max: usize,
    },

    #[error("{0}: only .pdf and .txt resumes are supported")]
    UnsupportedType(String),

    #[error("{0}: not a valid PDF")]
    NotAPdf(String),

    #[error("{0}: text extraction failed: {1}")]
    Extraction(String, String),

    #[error("{0}: no text could be extracted")]
    EmptyText(String),

    #[error("{0}: no email found")]
    NoEmail(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Repository(#[from] RepoError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResumeFormat {
    Pdf,
    Text,
}

impl ResumeFormat {
    fn detect(filename: &str) -> Option<Self> {
        let lower = filename.to_lowercase();
        if lower.ends_with(".pdf") {
            Some(ResumeFormat::Pdf)
        } else if lower.ends_with(".txt") {
            Some(ResumeFormat::Text)
        } else {
            None
        }
    }

    fn content_type(&self) -> &'static str {
        match self {
            ResumeFormat::Pdf => "application/pdf",
            ResumeFormat::Text => "text/plain",
        }
    }
}

/// One uploaded file as received from the multipart body.
#[derive(Debug, Clone)]
pub struct ResumeFile {
    pub filename: String,
    pub bytes: Bytes,
}

#[derive(Debug, Default, Serialize)]
pub struct IntakeReport {
    pub uploaded: u32,
    pub failed: u32,
    pub errors: Vec<String>,
}

pub struct ResumeIntake {
    repo: Arc<dyn PipelineRepository>,
    storage: Arc<dyn ResumeStorage>,
    max_bytes: usize,
}

impl ResumeIntake {
    pub fn new(
        repo: Arc<dyn PipelineRepository>,
        storage: Arc<dyn ResumeStorage>,
        max_bytes: usize,
    ) -> Self {
        Self {
            repo,
            storage,
            max_bytes,
        }
    }

    /// Processes every file independently; one bad file never blocks the rest.
    pub async fn ingest_all(&self, pipeline_id: Uuid, files: Vec<ResumeFile>) -> IntakeReport {
        let mut report = IntakeReport::default();
        for file in files {
            match self.ingest(pipeline_id, file).await {
                Ok(_) => report.uploaded += 1,
                Err(e) => {
                    warn!("Resume rejected for pipeline {}: {}", pipeline_id, e);
                    report.failed += 1;
                    report.errors.push(e.to_string());
                }
            }
        }
        info!(
            "Resume upload for pipeline {}: {} uploaded, {} failed",
            pipeline_id, report.uploaded, report.failed
        );
        report
    }

    pub async fn ingest(
        &self,
        pipeline_id: Uuid,
        file: ResumeFile,
    ) -> Result<(PipelineCandidate, bool), IntakeError> {
        let filename = safe_filename(&file.filename);
        if file.bytes.len() > self.max_bytes {
            return Err(IntakeError::TooLarge {
                filename,
                size: file.bytes.len(),
                max: self.max_bytes,
            });
        }
        let format =
            ResumeFormat::detect(&filename).ok_or_else(|| IntakeError::UnsupportedType(filename.clone()))?;

        let text = extract_text(&filename, format, &file.bytes).await?;
        let email = find_email(&text).ok_or_else(|| IntakeError::NoEmail(filename.clone()))?;
        let (first_name, last_name) = name_from_filename(&filename);

        let key = format!(
            "resumes/{}/{}/{}",
            pipeline_id,
            storage_segment(&email),
            filename
        );
        self.storage
            .put(&key, file.bytes, format.content_type())
            .await?;

        let (candidate, created) = self
            .repo
            .upsert_resume(
                pipeline_id,
                ResumeUpload {
                    email,
                    first_name,
                    last_name,
                    resume_key: key,
                    resume_text: text,
                },
            )
            .await?;
        Ok((candidate, created))
    }
}

/// PDF parsing is CPU-bound, so it runs on the blocking pool.
async fn extract_text(
    filename: &str,
    format: ResumeFormat,
    bytes: &Bytes,
) -> Result<String, IntakeError> {
    let text = match format {
        ResumeFormat::Pdf => {
            if !bytes.starts_with(b"%PDF") {
                return Err(IntakeError::NotAPdf(filename.to_string()));
            }
            let pdf = bytes.clone();
            tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&pdf))
                .await
                .map_err(|e| IntakeError::Extraction(filename.to_string(), e.to_string()))?
                .map_err(|e| IntakeError::Extraction(filename.to_string(), e.to_string()))?
        }
        ResumeFormat::Text => String::from_utf8_lossy(bytes).into_owned(),
    };
    let text = text.trim().to_string();
    if text.is_empty() {
        return Err(IntakeError::EmptyText(filename.to_string()));
    }
    Ok(text)
}

/// First email-looking token in the text, lowercased.
pub fn find_email(text: &str) -> Option<String> {
    RE_EMAIL.find(text).map(|m| m.as_str().to_lowercase())
}

/// "jane_van-der_berg.pdf" → ("Jane", "Van Der Berg"). Falls back to "Candidate".
pub fn name_from_filename(filename: &str) -> (String, String) {
    let stem = filename
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(filename);
    let parts: Vec<String> = stem
        .split(|c: char| c == '_' || c == '-' || c.is_whitespace())
        .filter(|p| !p.is_empty())
        .map(title_case)
        .collect();

    match parts.split_first() {
        Some((first, rest)) => (first.clone(), rest.join(" ")),
        None => ("Candidate".to_string(), String::new()),
    }
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
        None => String::new(),
    }
}

/// Strips any client-supplied directories.
fn safe_filename(raw: &str) -> String {
    let name = raw.rsplit(['/', '\\']).next().unwrap_or(raw).trim();
    if name.is_empty() {
        "resume".to_string()
    } else {
        name.to_string()
    }
}

fn storage_segment(email: &str) -> String {
    email
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
        .collect()
}
