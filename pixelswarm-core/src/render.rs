//! Hand-off contract between the simulation and whatever draws it.

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Per-particle output of a tick.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Transform {
    pub position: Vec2,
    pub scale: f32,
}

/// Static drawable created once per particle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sprite {
    pub origin: Vec2,
    pub scale: f32,
    /// Packed `0xRRGGBB`.
    pub tint: u32,
}

/// Everything a renderer needs before the first frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    pub width: f32,
    pub height: f32,
    pub background: u32,
    pub sprites: Vec<Sprite>,
}

/// Draws the particle scene.
///
/// `build_scene` is called once before any frame; `draw` receives the
/// transforms in the same order as `Scene::sprites`.
pub trait Renderer {
    type Error;

    fn build_scene(&mut self, scene: &Scene) -> Result<(), Self::Error>;

    fn draw(&mut self, frame: u64, transforms: &[Transform]) -> Result<(), Self::Error>;
}
