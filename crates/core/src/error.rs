//! Build errors shared by every kilt crate.

use crate::ResId;

pub type Result<T, E = KiltError> = std::result::Result<T, E>;

/// Every failure aborts the whole build; nothing is retried.
#[derive(Debug, thiserror::Error)]
pub enum KiltError {
    /// Missing or malformed kustomization document.
    #[error("kustomization {path}: {reason}")]
    Config { path: String, reason: String },
    /// A referenced file could not be read. `path` is the resolved path.
    #[error("cannot read file \"{path}\": {reason}")]
    Load { path: String, reason: String },
    #[error("invalid resource in {path}: {reason}")]
    InvalidResource { path: String, reason: String },
    #[error("duplicate resource id {id}")]
    DuplicateResource { id: ResId },
    #[error("generator {name}: {reason}")]
    Generator { name: String, reason: String },
    #[error("patch {path}: {reason}")]
    Patch { path: String, reason: String },
    #[error("base cycle detected at {path}")]
    Cycle { path: String },
}

/// Why a document cannot be wrapped as a [`crate::Resource`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DocError {
    #[error("document is not a mapping")]
    NotMapping,
    #[error("missing apiVersion")]
    MissingApiVersion,
    #[error("missing kind")]
    MissingKind,
    #[error("missing metadata.name")]
    MissingName,
}

impl KiltError {
    pub fn config(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Config { path: path.into(), reason: reason.into() }
    }

    pub fn load(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Load { path: path.into(), reason: reason.into() }
    }

    pub fn generator(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Generator { name: name.into(), reason: reason.into() }
    }

    pub fn patch(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Patch { path: path.into(), reason: reason.into() }
    }

    /// Short stable label, used as a metrics/tracing field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config { .. } => "config",
            Self::Load { .. } => "load",
            Self::InvalidResource { .. } => "invalid_resource",
            Self::DuplicateResource { .. } => "duplicate_resource",
            Self::Generator { .. } => "generator",
            Self::Patch { .. } => "patch",
            Self::Cycle { .. } => "cycle",
        }
    }
}
