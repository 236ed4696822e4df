//! Error taxonomy shared by every engine operation.

use thiserror::Error;

/// Everything that can go wrong while composing, masking or exporting.
#[derive(Debug, Error)]
pub enum ComposeError {
    /// Malformed or undecodable image bytes.
    #[error("could not decode image: {0}")]
    Decode(String),
    /// The generation service returned no image.
    #[error("image generation failed: {0}")]
    Generation(String),
    /// The edit service returned no image.
    #[error("image edit failed: {0}")]
    Edit(String),
    /// The foreground-mask service returned no mask.
    #[error("foreground mask failed: {0}")]
    Mask(String),
    #[error("nothing to export: no visible layers")]
    EmptyExport,
    /// Pixel-buffer acquisition failed. Fatal for the one operation only.
    #[error("render failed: {0}")]
    Render(String),
    #[error("could not encode image: {0}")]
    Encode(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid scene file: {0}")]
    Scene(String),
}

pub type ComposeResult<T> = Result<T, ComposeError>;
