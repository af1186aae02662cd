//! A single image particle and its per-tick update rule.

use glam::Vec2;
use pixelswarm_core::{Rgba, Sprite, Transform};
use rand::Rng;

const INITIAL_GRAVITY: f32 = 0.01;
const NEAR_GRAVITY_DECAY: f32 = 0.6;
const FAR_GRAVITY_RELAX: f32 = 0.1;
const REPULSION_FACTOR_DECAY: f32 = 0.5;
const REPULSION_FACTOR_BIAS: f32 = 0.01;
const REPULSION_FACTOR_RECOVERY: f32 = 0.03;
const DRAG: f32 = 0.95;
/// Displacement at which a particle renders at twice its origin scale.
const SCALE_FALLOFF: f32 = 512.0;

/// One point mass anchored to a source pixel.
///
/// `gravity` and `mouse_repulsion_factor` are low-pass filtered every tick so
/// the particle eases in and out of the pointer's influence instead of
/// snapping.
#[derive(Debug, Clone)]
pub struct Particle {
    position: Vec2,
    origin_position: Vec2,
    velocity: Vec2,
    repulsion: f32,
    mouse_repulsion_factor: f32,
    gravity: f32,
    max_gravity: f32,
    scale: f32,
    origin_scale: f32,
    color: Rgba,
}

impl Particle {
    /// Creates a particle at its origin with randomized kick and spring constants.
    pub fn new<R: Rng + ?Sized>(
        origin_position: Vec2,
        origin_scale: f32,
        color: Rgba,
        rng: &mut R,
    ) -> Self {
        let velocity = Vec2::new(rng.gen_range(0.0..50.0), rng.gen_range(0.0..50.0));
        Self {
            position: origin_position,
            origin_position,
            velocity,
            repulsion: rng.gen_range(1.0..5.0),
            mouse_repulsion_factor: 1.0,
            gravity: INITIAL_GRAVITY,
            max_gravity: rng.gen_range(0.01..0.04),
            scale: origin_scale,
            origin_scale,
            color,
        }
    }

    /// Advances the particle by one frame.
    ///
    /// The pointer phase must run before the origin phase: the gravity decay
    /// applied near the pointer feeds the spring pull of the same tick.
    pub fn tick(&mut self, pointer: Vec2, repulsion_change_distance: f32) -> Transform {
        self.apply_pointer(pointer, repulsion_change_distance);
        self.apply_origin();

        self.velocity *= DRAG;
        self.position += self.velocity;

        self.transform()
    }

    fn apply_pointer(&mut self, pointer: Vec2, repulsion_change_distance: f32) {
        let offset = pointer - self.position;
        let distance = offset.length();

        if distance < repulsion_change_distance {
            self.gravity *= NEAR_GRAVITY_DECAY;
            self.mouse_repulsion_factor = (self.mouse_repulsion_factor * REPULSION_FACTOR_DECAY
                - REPULSION_FACTOR_BIAS)
                .max(0.0);
            // Coincident pointer: no direction to push along this tick.
            if distance > 0.0 {
                self.velocity -= offset / distance * self.repulsion;
            }
            self.velocity *= 1.0 - self.mouse_repulsion_factor;
        } else {
            self.gravity += (self.max_gravity - self.gravity) * FAR_GRAVITY_RELAX;
            self.mouse_repulsion_factor =
                (self.mouse_repulsion_factor + REPULSION_FACTOR_RECOVERY).min(1.0);
        }
    }

    fn apply_origin(&mut self) {
        let offset = self.origin_position - self.position;
        let distance = offset.length();

        self.velocity += offset * self.gravity;
        // Unclamped: far-flung particles keep growing.
        self.scale = self.origin_scale + self.origin_scale * distance / SCALE_FALLOFF;
    }

    pub fn transform(&self) -> Transform {
        Transform { position: self.position, scale: self.scale }
    }

    /// Static drawable for this particle; the tint never changes.
    pub fn sprite(&self) -> Sprite {
        Sprite {
            origin: self.origin_position,
            scale: self.origin_scale,
            tint: self.color.tint(),
        }
    }

    pub fn position(&self) -> Vec2 {
        self.position
    }

    pub fn origin_position(&self) -> Vec2 {
        self.origin_position
    }

    pub fn velocity(&self) -> Vec2 {
        self.velocity
    }

    pub fn repulsion(&self) -> f32 {
        self.repulsion
    }

    pub fn mouse_repulsion_factor(&self) -> f32 {
        self.mouse_repulsion_factor
    }

    pub fn gravity(&self) -> f32 {
        self.gravity
    }

    pub fn max_gravity(&self) -> f32 {
        self.max_gravity
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn origin_scale(&self) -> f32 {
        self.origin_scale
    }

    pub fn color(&self) -> Rgba {
        self.color
    }

    #[cfg(test)]
    pub(crate) fn set_velocity(&mut self, velocity: Vec2) {
        self.velocity = velocity;
    }
}
