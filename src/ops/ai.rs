// ============================================================================
// AI OPERATIONS — generative service contracts and result validation
// ============================================================================
//
// Generation, prompt-based editing and foreground segmentation are opaque
// async services that hand back encoded image bytes. The engine only checks
// that something usable came back; layer bookkeeping lives on `Project`.

use std::path::Path;

use crate::error::{ComposeError, ComposeResult};
use crate::io;
use crate::ops::mask;

/// Backend for the three generative operations.
#[allow(async_fn_in_trait)]
pub trait ImageService {
    /// Text-to-image. Returns encoded image bytes.
    async fn generate_image(&self, prompt: &str) -> ComposeResult<Vec<u8>>;
    /// Image + instruction → edited image bytes.
    async fn edit_image(&self, image: &[u8], prompt: &str) -> ComposeResult<Vec<u8>>;
    /// Binary foreground/background mask (white = keep) for `image`.
    async fn generate_foreground_mask(&self, image: &[u8]) -> ComposeResult<Vec<u8>>;
}

/// Ask the service for a new image; an empty payload counts as no image.
pub async fn request_generation<S: ImageService>(service: &S, prompt: &str) -> ComposeResult<Vec<u8>> {
    log::info!("ai: generating image ({} char prompt)", prompt.chars().count());
    let bytes = service.generate_image(prompt).await?;
    if bytes.is_empty() {
        return Err(ComposeError::Generation("service returned no image".into()));
    }
    Ok(bytes)
}

pub async fn request_edit<S: ImageService>(service: &S, image: &[u8], prompt: &str) -> ComposeResult<Vec<u8>> {
    log::info!("ai: editing {} byte image", image.len());
    let bytes = service.edit_image(image, prompt).await?;
    if bytes.is_empty() {
        return Err(ComposeError::Edit("service returned no image".into()));
    }
    Ok(bytes)
}

pub async fn request_mask<S: ImageService>(service: &S, image: &[u8]) -> ComposeResult<Vec<u8>> {
    let bytes = service.generate_foreground_mask(image).await?;
    if bytes.is_empty() {
        return Err(ComposeError::Mask("service returned no mask".into()));
    }
    Ok(bytes)
}

/// Full background-removal pass: fetch a mask for `original` and composite it
/// into the alpha channel. Returns PNG bytes.
pub async fn remove_background<S: ImageService>(service: &S, original: &[u8]) -> ComposeResult<Vec<u8>> {
    let mask_bytes = request_mask(service, original).await?;
    mask::apply_mask(original, &mask_bytes)
}

// ============================================================================
// OFFLINE BACKEND
// ============================================================================

/// Serves a mask that was computed ahead of time. Used by the headless CLI,
/// where no generative backend is available.
#[derive(Clone, Debug)]
pub struct PrecomputedMaskService {
    mask: Vec<u8>,
}

impl PrecomputedMaskService {
    pub fn new(mask: Vec<u8>) -> Self {
        Self { mask }
    }

    pub fn from_file(path: &Path) -> ComposeResult<Self> {
        let mask = io::read_bytes(path)?;
        log::debug!("ai: loaded precomputed mask {} ({} bytes)", path.display(), mask.len());
        Ok(Self::new(mask))
    }
}

impl ImageService for PrecomputedMaskService {
    async fn generate_image(&self, _prompt: &str) -> ComposeResult<Vec<u8>> {
        Err(ComposeError::Generation("no generation backend configured".into()))
    }

    async fn edit_image(&self, _image: &[u8], _prompt: &str) -> ComposeResult<Vec<u8>> {
        Err(ComposeError::Edit("no edit backend configured".into()))
    }

    async fn generate_foreground_mask(&self, _image: &[u8]) -> ComposeResult<Vec<u8>> {
        Ok(self.mask.clone())
    }
}
