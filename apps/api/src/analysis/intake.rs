//! Request intake for `/api/analyze`: multipart parsing, upload validation and
//! resume text extraction.

use axum::extract::Multipart;
use bytes::Bytes;
use tracing::warn;

use crate::errors::AppError;

pub const MAX_RESUME_BYTES: usize = 5 * 1024 * 1024;
pub const MIN_JOB_DESCRIPTION_CHARS: usize = 50;
pub const MAX_JOB_DESCRIPTION_CHARS: usize = 5000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeFormat {
    Pdf,
    Doc,
    Docx,
    Text,
}

impl ResumeFormat {
    fn from_content_type(content_type: &str) -> Option<Self> {
        let essence = content_type.split(';').next()?.trim().to_ascii_lowercase();
        match essence.as_str() {
            "application/pdf" => Some(Self::Pdf),
            "application/msword" => Some(Self::Doc),
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => {
                Some(Self::Docx)
            }
            "text/plain" => Some(Self::Text),
            _ => None,
        }
    }

    fn from_file_name(file_name: &str) -> Option<Self> {
        let (_, ext) = file_name.rsplit_once('.')?;
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "doc" => Some(Self::Doc),
            "docx" => Some(Self::Docx),
            "txt" => Some(Self::Text),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResumeUpload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

#[derive(Debug)]
pub struct Submission {
    pub resume: ResumeUpload,
    pub job_description: String,
}

fn bad_multipart(e: impl std::fmt::Display) -> AppError {
    AppError::Validation(format!("Invalid multipart body: {e}"))
}

/// Reads the `resume` file and `jobDescription` text fields. Other fields are ignored.
pub async fn read_submission(mut multipart: Multipart) -> Result<Submission, AppError> {
    let mut resume = None;
    let mut job_description = None;

    while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("resume") => {
                let file_name = field.file_name().unwrap_or("resume").to_string();
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await.map_err(bad_multipart)?;
                resume = Some(ResumeUpload {
                    file_name,
                    content_type,
                    bytes,
                });
            }
            Some("jobDescription") => {
                job_description = Some(field.text().await.map_err(bad_multipart)?);
            }
            _ => {}
        }
    }

    let resume =
        resume.ok_or_else(|| AppError::Validation("No resume file provided".to_string()))?;
    let job_description = job_description
        .ok_or_else(|| AppError::Validation("Job description cannot be empty".to_string()))?;

    Ok(Submission {
        resume,
        job_description,
    })
}

/// Resolves the upload's format and enforces the size limit.
///
/// The declared content type wins; the file extension is only consulted when the
/// type is absent or the generic `application/octet-stream`.
pub fn validate_resume(upload: &ResumeUpload) -> Result<ResumeFormat, AppError> {
    let declared = upload
        .content_type
        .as_deref()
        .filter(|ct| !ct.trim().eq_ignore_ascii_case("application/octet-stream"));

    let format = match declared {
        Some(ct) => ResumeFormat::from_content_type(ct),
        None => ResumeFormat::from_file_name(&upload.file_name),
    }
    .ok_or_else(|| {
        AppError::Validation(
            "Invalid file type. Please upload a PDF, DOC, DOCX, or TXT file.".to_string(),
        )
    })?;

    if upload.bytes.len() > MAX_RESUME_BYTES {
        return Err(AppError::Validation(
            "File too large. Maximum size is 5MB.".to_string(),
        ));
    }
    if upload.bytes.is_empty() {
        return Err(AppError::Validation("Resume file is empty".to_string()));
    }

    Ok(format)
}

pub fn validate_job_description(text: &str) -> Result<(), AppError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation(
            "Job description cannot be empty".to_string(),
        ));
    }
    if trimmed.chars().count() < MIN_JOB_DESCRIPTION_CHARS {
        return Err(AppError::Validation(format!(
            "Job description is too short. Please provide at least {MIN_JOB_DESCRIPTION_CHARS} characters."
        )));
    }
    if text.chars().count() > MAX_JOB_DESCRIPTION_CHARS {
        return Err(AppError::Validation(format!(
            "Job description is too long. Maximum is {MAX_JOB_DESCRIPTION_CHARS} characters."
        )));
    }
    Ok(())
}

/// Extracts plain text from the upload. PDFs go through `pdf-extract` on the
/// blocking pool; if that fails the raw bytes are decoded lossily instead.
pub async fn extract_text(upload: &ResumeUpload, format: ResumeFormat) -> Result<String, AppError> {
    let text = match format {
        ResumeFormat::Pdf => {
            let bytes = upload.bytes.clone();
            match tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
                .await
            {
                Ok(Ok(text)) => text,
                Ok(Err(e)) => {
                    warn!("PDF extraction failed for '{}': {e}", upload.file_name);
                    lossy_text(&upload.bytes)
                }
                // pdf-extract panics on some malformed files
                Err(e) => {
                    warn!("PDF extraction aborted for '{}': {e}", upload.file_name);
                    lossy_text(&upload.bytes)
                }
            }
        }
        ResumeFormat::Doc | ResumeFormat::Docx | ResumeFormat::Text => lossy_text(&upload.bytes),
    };

    let text = text.trim();
    if text.is_empty() {
        return Err(AppError::Validation(
            "Could not extract any text from the resume".to_string(),
        ));
    }
    Ok(text.to_string())
}

fn lossy_text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}
