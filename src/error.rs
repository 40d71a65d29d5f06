//! Error types shared by the copier library
//!
//! Every failure a copy or deploy can hit is one variant of [`CopierError`].
//! The CLI layer wraps these in `anyhow` with command context.

use crate::api::metadata::DeployState;

pub type CopierResult<T> = Result<T, CopierError>;

#[derive(Debug, thiserror::Error)]
pub enum CopierError {
    /// Auth or network failure reaching Salesforce. Never retried.
    #[error("Salesforce is unavailable: {message}")]
    UpstreamUnavailable {
        message: String,
        #[source]
        source: Option<reqwest::Error>,
    },

    /// A source item vanished or could not be fetched.
    #[error("Failed to retrieve metadata for '{full_name}': {reason}")]
    MetadataRetrieval { full_name: String, reason: String },

    /// The rewriter cannot safely transform this component.
    #[error("Unsupported component '{full_name}': {reason}")]
    UnsupportedComponent { full_name: String, reason: String },

    /// Polling exceeded the configured wait. The job keeps running remotely.
    #[error("Deploy {job_id} did not finish in time (last status: {last_status})")]
    DeployTimeout {
        job_id: String,
        last_status: DeployState,
    },

    #[error("Refusing to deploy an empty package")]
    EmptyPackage,

    #[error("{what} not found: {key}")]
    NotFound { what: &'static str, key: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Malformed XML in {context}: {message}")]
    Xml { context: String, message: String },

    #[error("Package archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CopierError {
    pub fn upstream(message: impl Into<String>) -> Self {
        CopierError::UpstreamUnavailable {
            message: message.into(),
            source: None,
        }
    }

    pub fn xml(context: impl Into<String>, message: impl std::fmt::Display) -> Self {
        CopierError::Xml {
            context: context.into(),
            message: message.to_string(),
        }
    }

    pub fn unsupported(full_name: impl Into<String>, reason: impl Into<String>) -> Self {
        CopierError::UnsupportedComponent {
            full_name: full_name.into(),
            reason: reason.into(),
        }
    }

    pub fn retrieval(full_name: impl Into<String>, reason: impl Into<String>) -> Self {
        CopierError::MetadataRetrieval {
            full_name: full_name.into(),
            reason: reason.into(),
        }
    }

    /// Errors that only affect a single item; the rest of the package can still be built.
    pub fn is_item_scoped(&self) -> bool {
        matches!(
            self,
            CopierError::MetadataRetrieval { .. } | CopierError::UnsupportedComponent { .. }
        )
    }
}

impl From<reqwest::Error> for CopierError {
    fn from(error: reqwest::Error) -> Self {
        CopierError::UpstreamUnavailable {
            message: error.to_string(),
            source: Some(error),
        }
    }
}
