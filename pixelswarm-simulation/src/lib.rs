pub mod error;
pub mod particle;
pub mod pointer;
pub mod system;

pub use error::SystemError;
pub use particle::Particle;
pub use pointer::ScriptedPointer;
pub use system::{
    image_offset, image_scale, ParticleSystem, SystemSettings, Viewport,
    DEFAULT_PADDING, DEFAULT_PARALLEL_THRESHOLD, DEFAULT_REPULSION_CHANGE_DISTANCE,
    DEFAULT_REPULSION_DECAY_PER_FRAME,
};
