use glam::Vec2;

/// Pointer sample for one frame.
///
/// `moved` is the edge signal raised by a move (mouse or touch) since the
/// previous frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerState {
    pub position: Vec2,
    pub moved: bool,
}

impl PointerState {
    pub fn still(position: Vec2) -> Self {
        Self { position, moved: false }
    }
}

impl Default for PointerState {
    fn default() -> Self {
        Self::still(Vec2::ZERO)
    }
}

/// Produces the pointer state the host loop feeds into each tick.
pub trait PointerSource {
    fn poll(&mut self, frame: u64) -> PointerState;
}
