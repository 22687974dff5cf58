use crate::model::{Id, NodeKind};
use std::fmt;
use thiserror::Error;

/// Failure taxonomy of the copy engine. None of these are retried
/// internally; a failed property aborts the whole copy call. Nodes already
/// persisted before the failure are not rolled back.
///
/// `Display`/`Error` are implemented by hand instead of derived: thiserror
/// would treat the `source: Id` field of `PropertyCopyFailed` as the error
/// source, but `Id` is a plain `String` and the field name is part of the
/// public shape.
#[derive(Debug)]
pub enum CopyError {
    DestinationRejects {
        destination: Id,
        kind: NodeKind,
    },

    PropertyCopyFailed {
        property: String,
        source: Id,
        destination: Id,
        reason: String,
    },

    CannotInstantiate(NodeKind),

    UnknownUseCase(Id),

    NodeMissing(Id),

    Store(anyhow::Error),
}

impl fmt::Display for CopyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CopyError::DestinationRejects { destination, kind } => write!(
                f,
                "destination '{destination}' does not accept nodes of kind {kind:?}"
            ),
            CopyError::PropertyCopyFailed {
                property,
                source,
                destination,
                reason,
            } => write!(
                f,
                "failed to copy property '{property}' from '{source}' to '{destination}': {reason}"
            ),
            CopyError::CannotInstantiate(kind) => write!(
                f,
                "nodes of kind {kind:?} cannot be instantiated by the copy engine"
            ),
            CopyError::UnknownUseCase(id) => write!(
                f,
                "node '{id}' reached post-copy rewiring without a recognized use case"
            ),
            CopyError::NodeMissing(id) => write!(f, "node '{id}' not found"),
            CopyError::Store(err) => fmt::Display::fmt(err, f),
        }
    }
}

impl std::error::Error for CopyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CopyError::Store(err) => {
                std::error::Error::source(AsRef::<dyn std::error::Error>::as_ref(err))
            }
            _ => None,
        }
    }
}

impl From<anyhow::Error> for CopyError {
    fn from(err: anyhow::Error) -> Self {
        CopyError::Store(err)
    }
}

#[derive(Debug, Error)]
pub enum MoveError {
    #[error("destination '{destination}' does not accept nodes of kind {kind:?}")]
    DestinationRejects { destination: Id, kind: NodeKind },

    #[error("node '{0}' not found")]
    NodeMissing(Id),

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}
