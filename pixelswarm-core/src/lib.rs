//! Shared value types and collaborator seams for the pixel swarm.
//!
//! The simulation crate only ever talks to the outside world through the
//! traits defined here: an [`ImageSampler`] to read the source bitmap, a
//! [`PointerSource`] for the pointer signal and a [`Renderer`] that receives
//! the scene and per-frame transforms.

pub mod color;
pub mod image;
pub mod pointer;
pub mod render;
pub mod scheduler;

pub use glam::Vec2;

// Re-export commonly used items
pub use color::Rgba;
pub use image::{ImageError, ImageSampler, PixelBuffer};
pub use pointer::{PointerSource, PointerState};
pub use render::{Renderer, Scene, Sprite, Transform};
pub use scheduler::{FrameReport, FrameScheduler, FrameTiming};
