//! Renderer error types.

use crate::backend::traits::BackendError;
use crate::scene::MeshId;
use thiserror::Error;

/// Errors surfaced while loading a scene or rebuilding the pipeline.
///
/// Per-frame rendering deliberately has no error type of its own beyond the
/// backend's: recoverable conditions (missing materials, excess lights) are
/// substituted or clamped instead of failing the frame.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("mesh {0:?} has attribute arrays of differing lengths")]
    MismatchedAttributes(MeshId),
}

pub type RenderResult<T> = Result<T, RenderError>;
