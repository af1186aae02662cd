use thiserror::Error;

/// Errors raised while building a particle system.
///
/// All of them are fatal at construction; a running system never fails.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SystemError {
    #[error("Source image has zero area ({width}x{height})")]
    EmptyImage { width: u32, height: u32 },

    #[error("Viewport dimensions must be positive, got {width}x{height}")]
    InvalidViewport { width: f32, height: f32 },

    #[error("Padding {padding} leaves no drawable area in a {width}x{height} viewport")]
    PaddingTooLarge { padding: f32, width: f32, height: f32 },

    #[error("Particle size must be at least 1")]
    InvalidParticleSize,
}
