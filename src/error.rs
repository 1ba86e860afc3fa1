use std::path::PathBuf;

use thiserror::Error;

/// Every failure surfaced by the generator. Nothing is retried; the first
/// error aborts the current operation.
#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("failed to load model `{model_id}`: {reason}")]
    ModelLoad { model_id: String, reason: String },

    #[error("inference failed: {0}")]
    Inference(String),

    #[error("failed to read table {}: {reason}", path.display())]
    TableRead { path: PathBuf, reason: String },

    #[error("column `{column}` not found in {} (available: {})", path.display(), available.join(", "))]
    ColumnNotFound {
        column: String,
        path: PathBuf,
        available: Vec<String>,
    },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, EmbedError>;

impl EmbedError {
    pub(crate) fn model_load(model_id: &str, err: anyhow::Error) -> Self {
        Self::ModelLoad {
            model_id: model_id.to_string(),
            reason: format!("{err:#}"),
        }
    }

    pub(crate) fn inference(err: anyhow::Error) -> Self {
        Self::Inference(format!("{err:#}"))
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
