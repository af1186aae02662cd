use std::time::{Duration, Instant};

/// Timing handed to the loop body at the start of a frame.
#[derive(Debug, Clone, Copy)]
pub struct FrameTiming {
    pub frame: u64,
    /// Time since the previous frame measured in nominal frames.
    pub dt_frames: f32,
    pub started: Instant,
}

/// Outcome of a frame once the loop body has run.
#[derive(Debug, Clone, Copy)]
pub struct FrameReport {
    pub elapsed: Duration,
    /// How far the frame ran over budget, if it did.
    pub overrun: Option<Duration>,
}

/// Fixed-rate frame pacing for the host loop.
pub struct FrameScheduler {
    frame_duration: Duration,
    fixed_timestep: bool, // dt_frames is always 1.0 when set
    frame: u64,
    last_start: Option<Instant>,
}

impl FrameScheduler {
    pub fn new(frame_rate: u32) -> Self {
        Self {
            frame_duration: Duration::from_secs_f64(1.0 / frame_rate.max(1) as f64),
            fixed_timestep: true,
            frame: 0,
            last_start: None,
        }
    }

    /// Choose between a fixed timestep and one measured from wall time
    pub fn with_fixed_timestep(mut self, fixed: bool) -> Self {
        self.fixed_timestep = fixed;
        self
    }

    pub fn frame_duration(&self) -> Duration {
        self.frame_duration
    }

    pub fn frames_elapsed(&self) -> u64 {
        self.frame
    }

    /// Mark the start of a frame.
    pub fn begin_frame(&mut self) -> FrameTiming {
        let now = Instant::now();
        let dt_frames = match (self.fixed_timestep, self.last_start) {
            (false, Some(last)) => self.dt_frames_for(now.duration_since(last)),
            _ => 1.0,
        };
        self.last_start = Some(now);

        let timing = FrameTiming { frame: self.frame, dt_frames, started: now };
        self.frame += 1;
        timing
    }

    /// Sleep out the remainder of the frame budget.
    pub fn end_frame(&self, timing: &FrameTiming) -> FrameReport {
        let elapsed = timing.started.elapsed();
        if elapsed < self.frame_duration {
            spin_sleep::sleep(self.frame_duration - elapsed);
            FrameReport { elapsed, overrun: None }
        } else {
            FrameReport { elapsed, overrun: Some(elapsed - self.frame_duration) }
        }
    }

    /// Converts wall time between frames into nominal frames.
    pub fn dt_frames_for(&self, elapsed: Duration) -> f32 {
        (elapsed.as_secs_f64() / self.frame_duration.as_secs_f64()) as f32
    }
}

impl Default for FrameScheduler {
    fn default() -> Self {
        Self::new(60)
    }
}
