use thiserror::Error;

use super::models::{ExecuteRequest, LegacyQuery};
use crate::config::is_http_url;
use crate::executor::{InvalidQuality, Job, MediaKind, Quality};

const MAX_URL_LEN: usize = 2048;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequestValidationError {
    #[error("url required")]
    MissingUrl,
    #[error("url & quality required")]
    MissingUrlOrQuality,
    #[error("url must be an absolute http(s) URL")]
    InvalidUrl,
    #[error("url exceeds 2048 characters")]
    UrlTooLong,
    #[error(transparent)]
    InvalidQuality(#[from] InvalidQuality),
}

/// Build a job from an execute body. Missing video quality means `max`.
pub fn job_from_execute(request: &ExecuteRequest) -> Result<Job, RequestValidationError> {
    let url = validate_url(Some(request.url.as_str()), RequestValidationError::MissingUrl)?;

    match request.kind {
        MediaKind::Audio => Ok(Job::Audio { url }),
        MediaKind::Video => {
            let quality = match request.quality.as_deref() {
                None | Some("") => Quality::Max,
                Some(raw) => raw.parse()?,
            };
            Ok(Job::Video { url, quality })
        }
    }
}

/// Build a job from a legacy query. Video requires an explicit quality.
pub fn job_from_legacy(kind: MediaKind, query: &LegacyQuery) -> Result<Job, RequestValidationError> {
    match kind {
        MediaKind::Audio => {
            let url = validate_url(query.url.as_deref(), RequestValidationError::MissingUrl)?;
            Ok(Job::Audio { url })
        }
        MediaKind::Video => {
            let quality = query
                .quality
                .as_deref()
                .filter(|q| !q.trim().is_empty())
                .ok_or(RequestValidationError::MissingUrlOrQuality)?;
            let url = validate_url(
                query.url.as_deref(),
                RequestValidationError::MissingUrlOrQuality,
            )?;
            Ok(Job::Video {
                url,
                quality: quality.parse()?,
            })
        }
    }
}

fn validate_url(
    url: Option<&str>,
    missing: RequestValidationError,
) -> Result<String, RequestValidationError> {
    let url = url.map(str::trim).filter(|u| !u.is_empty()).ok_or(missing)?;

    if url.len() > MAX_URL_LEN {
        return Err(RequestValidationError::UrlTooLong);
    }
    if !is_http_url(url) {
        return Err(RequestValidationError::InvalidUrl);
    }

    Ok(url.to_string())
}
