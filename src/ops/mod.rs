pub mod adjustments;
pub mod ai;
pub mod export;
pub mod filters;
pub mod mask;
pub mod transform;
