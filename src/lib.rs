//! LayerFE — layered image composition engine.
//!
//! Layers live in a [`canvas::LayerStore`], are transformed through the
//! pointer state machine in [`gesture`], and are flattened by
//! [`ops::export`]. [`project::Project`] ties these together.

pub mod canvas;
pub mod cli;
pub mod error;
pub mod gesture;
pub mod io;
pub mod logger;
pub mod ops;
pub mod project;
pub mod settings;

pub use canvas::{BlendMode, ColorCorrection, Layer, LayerId, LayerPatch, LayerStore, Viewport, ZDirection};
pub use error::{ComposeError, ComposeResult};
pub use project::Project;
