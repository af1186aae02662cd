//! Deterministic pointer paths for driving the swarm without an input device.

use glam::Vec2;
use pixelswarm_core::{PointerSource, PointerState};
use std::f32::consts::TAU;

/// Shape of a scripted pointer path.
#[derive(Debug, Clone, PartialEq)]
pub enum PointerPath {
    /// Pointer parked at the screen origin, never moving.
    Idle,
    Fixed(Vec2),
    Orbit { center: Vec2, radius: f32, period_frames: u32 },
    /// Linear interpolation between points, `frames_per_leg` frames each.
    Waypoints { points: Vec<Vec2>, frames_per_leg: u32, looped: bool },
}

impl PointerPath {
    /// Position of the pointer at `frame`.
    pub fn position_at(&self, frame: u64) -> Vec2 {
        match self {
            PointerPath::Idle => Vec2::ZERO,
            PointerPath::Fixed(position) => *position,
            PointerPath::Orbit { center, radius, period_frames } => {
                let period = (*period_frames).max(1) as u64;
                let angle = TAU * (frame % period) as f32 / period as f32;
                *center + Vec2::new(angle.cos(), angle.sin()) * *radius
            }
            PointerPath::Waypoints { points, frames_per_leg, looped } => {
                waypoint_position(points, (*frames_per_leg).max(1) as u64, *looped, frame)
            }
        }
    }
}

fn waypoint_position(points: &[Vec2], frames_per_leg: u64, looped: bool, frame: u64) -> Vec2 {
    match points {
        [] => Vec2::ZERO,
        [only] => *only,
        _ => {
            let legs = if looped { points.len() as u64 } else { points.len() as u64 - 1 };
            let mut leg = frame / frames_per_leg;
            if looped {
                leg %= legs;
            } else if leg >= legs {
                return points[points.len() - 1];
            }
            let t = (frame % frames_per_leg) as f32 / frames_per_leg as f32;
            let from = points[leg as usize];
            let to = points[(leg as usize + 1) % points.len()];
            from.lerp(to, t)
        }
    }
}

/// [`PointerSource`] that follows a [`PointerPath`].
///
/// The `moved` edge is raised whenever the position differs from the
/// previous poll, the way a move event would fire.
#[derive(Debug, Clone)]
pub struct ScriptedPointer {
    path: PointerPath,
    last: Option<Vec2>,
}

impl ScriptedPointer {
    pub fn new(path: PointerPath) -> Self {
        Self { path, last: None }
    }
}

impl PointerSource for ScriptedPointer {
    fn poll(&mut self, frame: u64) -> PointerState {
        let position = self.path.position_at(frame);
        let moved = match self.path {
            PointerPath::Idle => false,
            _ => self.last != Some(position),
        };
        self.last = Some(position);
        PointerState { position, moved }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_never_moves() {
        let mut pointer = ScriptedPointer::new(PointerPath::Idle);
        for frame in 0..10 {
            assert_eq!(pointer.poll(frame), PointerState::still(Vec2::ZERO));
        }
    }

    #[test]
    fn fixed_moves_once_on_arrival() {
        let mut pointer = ScriptedPointer::new(PointerPath::Fixed(Vec2::new(4.0, 2.0)));
        assert!(pointer.poll(0).moved);
        assert!(!pointer.poll(1).moved);
        assert_eq!(pointer.poll(2).position, Vec2::new(4.0, 2.0));
    }

    #[test]
    fn orbit_circles_center() {
        let path = PointerPath::Orbit { center: Vec2::new(100.0, 50.0), radius: 20.0, period_frames: 4 };
        assert!(path.position_at(0).distance(Vec2::new(120.0, 50.0)) < 1e-4);
        assert!(path.position_at(1).distance(Vec2::new(100.0, 70.0)) < 1e-4);
        assert!(path.position_at(6).distance(Vec2::new(80.0, 50.0)) < 1e-4);

        let mut pointer = ScriptedPointer::new(path);
        assert!((0..20).all(|frame| pointer.poll(frame).moved));
    }

    #[test]
    fn waypoints_interpolate_and_stop_at_end() {
        let path = PointerPath::Waypoints {
            points: vec![Vec2::new(0.0, 0.0), Vec2::new(10.0, 0.0), Vec2::new(10.0, 10.0)],
            frames_per_leg: 10,
            looped: false,
        };
        assert_eq!(path.position_at(5), Vec2::new(5.0, 0.0));
        assert_eq!(path.position_at(15), Vec2::new(10.0, 5.0));
        assert_eq!(path.position_at(20), Vec2::new(10.0, 10.0));
        assert_eq!(path.position_at(500), Vec2::new(10.0, 10.0));

        let mut pointer = ScriptedPointer::new(path);
        pointer.poll(20);
        assert!(!pointer.poll(21).moved);
    }

    #[test]
    fn looped_waypoints_return_to_start() {
        let path = PointerPath::Waypoints {
            points: vec![Vec2::new(0.0, 0.0), Vec2::new(10.0, 0.0)],
            frames_per_leg: 4,
            looped: true,
        };
        assert_eq!(path.position_at(6), Vec2::new(5.0, 0.0));
        assert_eq!(path.position_at(8), Vec2::new(0.0, 0.0));
        assert_eq!(path.position_at(10), Vec2::new(5.0, 0.0));
    }
}
