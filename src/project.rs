use egui::{Pos2, Vec2};
use uuid::Uuid;

use crate::canvas::{self, ImageSource, Layer, LayerId, LayerPatch, LayerStore, RenderedLayer, Viewport, ZDirection};
use crate::error::{ComposeError, ComposeResult};
use crate::gesture::{GestureController, GestureState, HandleStyle};
use crate::ops::{ai, export};
use crate::settings::AppSettings;

/// Single open composition: the layer stack, the view onto it and the
/// in-flight gesture. All engine entry points go through here.
pub struct Project {
    pub id: Uuid,
    pub name: String,
    pub layers: LayerStore,
    pub viewport: Viewport,
    pub gestures: GestureController,
    pub settings: AppSettings,
    /// Counter for "Layer N" default names.
    layer_counter: usize,
}

impl Project {
    pub fn new(name: impl Into<String>, settings: AppSettings) -> Self {
        let handles = HandleStyle {
            radius: settings.handle_radius,
            rotate_offset: settings.rotate_handle_offset,
        };
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            layers: LayerStore::new(),
            viewport: Viewport::default(),
            gestures: GestureController::new(handles, settings.wheel_zoom_sensitivity),
            settings,
            layer_counter: 0,
        }
    }

    pub fn new_untitled(settings: AppSettings) -> Self {
        Self::new("Untitled", settings)
    }

    fn next_layer_name(&mut self) -> String {
        self.layer_counter += 1;
        format!("Layer {}", self.layer_counter)
    }

    /// Push `layer` on top of the stack.
    fn push_on_top(&mut self, mut layer: Layer) -> LayerId {
        layer.z_index = self.layers.next_z_index();
        self.layers.add(layer)
    }

    // ------------------------------------------------------------------------
    // Layer creation / deletion
    // ------------------------------------------------------------------------

    /// Decode `bytes` and add them as a new top layer `width` world units wide.
    pub fn import_image(
        &mut self,
        name: Option<String>,
        bytes: Vec<u8>,
        position: Pos2,
        width: f32,
    ) -> ComposeResult<LayerId> {
        let name = name.unwrap_or_else(|| self.next_layer_name());
        let layer = Layer::from_image_bytes(name, bytes, position, Some(width))?;
        log::info!("project: imported '{}' ({}x{})", layer.name, layer.size.x, layer.size.y);
        Ok(self.push_on_top(layer))
    }

    /// Same as [`Project::import_image`] at the image's native pixel width.
    pub fn import_image_native(&mut self, name: Option<String>, bytes: Vec<u8>, position: Pos2) -> ComposeResult<LayerId> {
        let name = name.unwrap_or_else(|| self.next_layer_name());
        let layer = Layer::from_image_bytes(name, bytes, position, None)?;
        log::info!("project: imported '{}' ({}x{})", layer.name, layer.size.x, layer.size.y);
        Ok(self.push_on_top(layer))
    }

    pub fn add_text_layer(&mut self, text: impl Into<String>, position: Pos2, size: Vec2) -> LayerId {
        let name = self.next_layer_name();
        self.push_on_top(Layer::text(name, text, position, size))
    }

    pub fn remove_layer(&mut self, id: LayerId) -> Option<Layer> {
        let removed = self.layers.remove(id);
        if removed.is_some() && self.gestures.state().target() == Some(id) {
            self.gestures.pointer_up();
        }
        removed
    }

    pub fn update_layer(&mut self, id: LayerId, patch: &LayerPatch) -> bool {
        self.layers.update(id, patch)
    }

    pub fn move_layer(&mut self, id: LayerId, direction: ZDirection) -> bool {
        self.layers.move_z(id, direction)
    }

    pub fn select(&mut self, id: Option<LayerId>) {
        self.layers.select(id);
    }

    // ------------------------------------------------------------------------
    // Pointer / wheel input (screen coordinates)
    // ------------------------------------------------------------------------

    pub fn pointer_down(&mut self, cursor: Pos2) -> GestureState {
        self.gestures.pointer_down(&mut self.layers, &self.viewport, cursor)
    }

    pub fn pointer_move(&mut self, cursor: Pos2) -> bool {
        self.gestures.pointer_move(&mut self.layers, &mut self.viewport, cursor)
    }

    pub fn pointer_up(&mut self) {
        self.gestures.pointer_up();
    }

    pub fn pointer_leave(&mut self) {
        self.gestures.pointer_leave();
    }

    pub fn wheel(&mut self, delta_y: f32, zoom_modifier: bool) -> bool {
        self.gestures.wheel(&mut self.viewport, delta_y, zoom_modifier)
    }

    // ------------------------------------------------------------------------
    // Output
    // ------------------------------------------------------------------------

    /// Screen-space draw list for the current view.
    pub fn render_list(&self) -> Vec<RenderedLayer> {
        canvas::composite(&self.layers, &self.viewport)
    }

    /// Flatten all visible layers to PNG bytes.
    pub fn export_png(&self) -> ComposeResult<Vec<u8>> {
        export::export_flattened(self.layers.layers())
    }

    // ------------------------------------------------------------------------
    // Generative workflows
    //
    // Each workflow runs in three steps: a request built from `&self`, the
    // service call on the detached request, and an apply step on `&mut self`.
    // The project is free for input while the service call is pending, and
    // the apply step drops results whose layer is gone.
    // ------------------------------------------------------------------------

    pub fn generation_request(&self, prompt: &str, position: Pos2) -> GenerateRequest {
        GenerateRequest {
            prompt: prompt.to_string(),
            position,
            width: self.settings.default_layer_width,
        }
    }

    /// Add a generated image as a new selected top layer.
    pub fn apply_generation(&mut self, request: GenerateRequest, bytes: Vec<u8>) -> ComposeResult<LayerId> {
        let id = self.import_image(Some(request.prompt), bytes, request.position, request.width)?;
        self.layers.select(Some(id));
        Ok(id)
    }

    /// Snapshot a layer's displayed pixels for an edit.
    /// `Ok(None)` when the layer does not exist.
    pub fn edit_request(&self, id: LayerId, prompt: &str) -> ComposeResult<Option<EditRequest>> {
        let Some(layer) = self.layers.get(id) else {
            return Ok(None);
        };
        let Some(image) = layer.pixel_source().cloned() else {
            return Err(ComposeError::Edit(format!("layer '{}' has no pixels", layer.name)));
        };
        let offset = egui::vec2(self.settings.duplicate_offset, self.settings.duplicate_offset);
        Ok(Some(EditRequest {
            source: id,
            image,
            prompt: prompt.to_string(),
            name: format!("{} (edited)", layer.name),
            position: layer.position + offset,
            width: layer.size.x,
        }))
    }

    /// Add an edit result as a new layer offset from its source. The source
    /// layer is left as it was. `Ok(None)` when the source was removed while
    /// the edit was running.
    pub fn apply_edit(&mut self, request: EditRequest, bytes: Vec<u8>) -> ComposeResult<Option<LayerId>> {
        if !self.layers.contains(request.source) {
            log::info!("project: edit result for removed layer {} dropped", request.source);
            return Ok(None);
        }
        let new_id = self.import_image(Some(request.name), bytes, request.position, request.width)?;
        self.layers.select(Some(new_id));
        Ok(Some(new_id))
    }

    /// First half of a background-removal toggle. A masked layer is restored
    /// to its original right away; an unmasked one yields the request that
    /// fetches its mask.
    pub fn begin_background_toggle(&mut self, id: LayerId) -> ComposeResult<BackgroundToggle> {
        let Some(layer) = self.layers.get(id) else {
            return Ok(BackgroundToggle::Missing);
        };
        if layer.masked {
            self.layers.restore_original(id);
            return Ok(BackgroundToggle::Restored);
        }
        let Some(original) = layer.original_pixel_source().cloned() else {
            return Err(ComposeError::Mask(format!("layer '{}' has no pixels", layer.name)));
        };
        Ok(BackgroundToggle::Pending(MaskRequest { layer: id, original }))
    }

    /// Show the masked derivative on the requested layer. Returns `false`
    /// when the layer is gone or no longer carries the original the mask was
    /// computed from.
    pub fn apply_masked_source(&mut self, request: MaskRequest, masked: Vec<u8>) -> bool {
        let current = self.layers.get(request.layer).and_then(|l| l.original_pixel_source());
        if !current.is_some_and(|orig| orig.same_data(&request.original)) {
            log::info!("project: mask result for layer {} dropped", request.layer);
            return false;
        }
        self.layers.set_masked_source(request.layer, ImageSource::new(masked))
    }

    /// Generate an image from `prompt` and add it as a new selected top layer.
    /// Borrows the project for the whole call; hosts that keep handling input
    /// meanwhile use [`Project::generation_request`] and
    /// [`Project::apply_generation`] instead.
    pub async fn generate_layer<S: ai::ImageService>(
        &mut self,
        service: &S,
        prompt: &str,
        position: Pos2,
    ) -> ComposeResult<LayerId> {
        let request = self.generation_request(prompt, position);
        let bytes = request.send(service).await?;
        self.apply_generation(request, bytes)
    }

    /// Edit a layer's current pixels with `prompt`; see [`Project::apply_edit`].
    pub async fn edit_layer<S: ai::ImageService>(
        &mut self,
        service: &S,
        id: LayerId,
        prompt: &str,
    ) -> ComposeResult<Option<LayerId>> {
        let Some(request) = self.edit_request(id, prompt)? else {
            return Ok(None);
        };
        let bytes = request.send(service).await?;
        self.apply_edit(request, bytes)
    }

    /// Toggle background removal. Turning it on fetches a mask for the
    /// original bytes and displays the masked derivative; turning it off
    /// points the layer back at the untouched original.
    /// Returns `Ok(false)` when the layer no longer exists.
    pub async fn toggle_background_removal<S: ai::ImageService>(&mut self, service: &S, id: LayerId) -> ComposeResult<bool> {
        match self.begin_background_toggle(id)? {
            BackgroundToggle::Missing => Ok(false),
            BackgroundToggle::Restored => Ok(true),
            BackgroundToggle::Pending(request) => {
                let masked = request.send(service).await?;
                Ok(self.apply_masked_source(request, masked))
            }
        }
    }
}

// ============================================================================
// DETACHED SERVICE REQUESTS
// ============================================================================

/// Prompt and placement for a layer that is being generated.
#[derive(Clone, Debug)]
pub struct GenerateRequest {
    pub prompt: String,
    pub position: Pos2,
    pub width: f32,
}

impl GenerateRequest {
    pub async fn send<S: ai::ImageService>(&self, service: &S) -> ComposeResult<Vec<u8>> {
        ai::request_generation(service, &self.prompt).await
    }
}

/// Pixels of the source layer plus placement of the edited copy.
#[derive(Clone, Debug)]
pub struct EditRequest {
    pub source: LayerId,
    image: ImageSource,
    pub prompt: String,
    pub name: String,
    pub position: Pos2,
    pub width: f32,
}

impl EditRequest {
    pub async fn send<S: ai::ImageService>(&self, service: &S) -> ComposeResult<Vec<u8>> {
        ai::request_edit(service, self.image.bytes(), &self.prompt).await
    }
}

/// Original bytes of the layer whose background is being removed.
#[derive(Clone, Debug)]
pub struct MaskRequest {
    pub layer: LayerId,
    original: ImageSource,
}

impl MaskRequest {
    /// Fetch the mask and composite it; resolves to the masked PNG.
    pub async fn send<S: ai::ImageService>(&self, service: &S) -> ComposeResult<Vec<u8>> {
        ai::remove_background(service, self.original.bytes()).await
    }
}

#[derive(Debug)]
pub enum BackgroundToggle {
    /// No layer with that id.
    Missing,
    /// The layer was masked and now shows its original again.
    Restored,
    Pending(MaskRequest),
}
