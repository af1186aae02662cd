//! Population build-out and the per-frame driver.

use crate::error::SystemError;
use crate::particle::Particle;
use glam::Vec2;
use log::{debug, info};
use pixelswarm_core::{ImageSampler, Renderer, Scene, Transform};
use rand::Rng;
use rayon::prelude::*;

/// Falloff radius restored on every pointer move.
pub const DEFAULT_REPULSION_CHANGE_DISTANCE: f32 = 80.0;
/// Falloff shrink per nominal frame.
pub const DEFAULT_REPULSION_DECAY_PER_FRAME: f32 = 1.5;
pub const DEFAULT_PADDING: f32 = 10.0;
pub const DEFAULT_PARALLEL_THRESHOLD: usize = 4096;

/// Screen area the image is fitted into.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
    pub padding: f32,
}

impl Viewport {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height, padding: DEFAULT_PADDING }
    }

    pub fn with_padding(mut self, padding: f32) -> Self {
        self.padding = padding;
        self
    }
}

/// Tunables that do not affect the per-particle rule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SystemSettings {
    /// Sample every n-th pixel in each direction.
    pub particle_size: u32,
    pub repulsion_reset_distance: f32,
    pub repulsion_decay_per_frame: f32,
    /// Populations at least this large tick on the rayon pool.
    pub parallel_threshold: usize,
    pub background: u32,
}

impl Default for SystemSettings {
    fn default() -> Self {
        Self {
            particle_size: 1,
            repulsion_reset_distance: DEFAULT_REPULSION_CHANGE_DISTANCE,
            repulsion_decay_per_frame: DEFAULT_REPULSION_DECAY_PER_FRAME,
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
            background: 0xFFFFFF,
        }
    }
}

/// Owns every particle and the shared repulsion falloff.
pub struct ParticleSystem {
    particles: Vec<Particle>,
    transforms: Vec<Transform>,
    repulsion_change_distance: f32,
    settings: SystemSettings,
    viewport: Viewport,
    frame: u64,
}

impl ParticleSystem {
    /// Builds the population from `image` with default settings.
    pub fn new<S, R>(image: &S, viewport: Viewport, rng: &mut R) -> Result<Self, SystemError>
    where
        S: ImageSampler + ?Sized,
        R: Rng + ?Sized,
    {
        Self::with_settings(image, viewport, SystemSettings::default(), rng)
    }

    pub fn with_settings<S, R>(
        image: &S,
        viewport: Viewport,
        settings: SystemSettings,
        rng: &mut R,
    ) -> Result<Self, SystemError>
    where
        S: ImageSampler + ?Sized,
        R: Rng + ?Sized,
    {
        if image.is_empty() {
            return Err(SystemError::EmptyImage { width: image.width(), height: image.height() });
        }
        if viewport.width <= 0.0 || viewport.height <= 0.0 {
            return Err(SystemError::InvalidViewport {
                width: viewport.width,
                height: viewport.height,
            });
        }
        let drawable_width = viewport.width - 2.0 * viewport.padding;
        let drawable_height = viewport.height - 2.0 * viewport.padding;
        if drawable_width <= 0.0 || drawable_height <= 0.0 {
            return Err(SystemError::PaddingTooLarge {
                padding: viewport.padding,
                width: viewport.width,
                height: viewport.height,
            });
        }
        if settings.particle_size == 0 {
            return Err(SystemError::InvalidParticleSize);
        }

        let particles = build_population(image, viewport, settings.particle_size, rng);
        info!(
            "Built {} particles from a {}x{} image (stride {})",
            particles.len(),
            image.width(),
            image.height(),
            settings.particle_size
        );
        let transforms = particles.iter().map(Particle::transform).collect();

        Ok(Self {
            particles,
            transforms,
            repulsion_change_distance: settings.repulsion_reset_distance,
            settings,
            viewport,
            frame: 0,
        })
    }

    /// Overrides the current falloff radius.
    pub fn with_repulsion_change_distance(mut self, distance: f32) -> Self {
        self.repulsion_change_distance = distance.max(0.0);
        self
    }

    /// Advances every particle by one frame.
    ///
    /// The falloff is reset or decayed before any particle reads it, so a
    /// move in this frame is seen by this frame's repulsion check.
    pub fn tick(&mut self, pointer: Vec2, pointer_moved: bool, dt_frames: f32) -> &[Transform] {
        self.update_repulsion_change_distance(pointer_moved, dt_frames);
        let distance = self.repulsion_change_distance;

        if self.particles.len() >= self.settings.parallel_threshold {
            self.particles
                .par_iter_mut()
                .zip(self.transforms.par_iter_mut())
                .for_each(|(particle, transform)| *transform = particle.tick(pointer, distance));
        } else {
            for (particle, transform) in self.particles.iter_mut().zip(self.transforms.iter_mut()) {
                *transform = particle.tick(pointer, distance);
            }
        }

        self.frame += 1;
        if self.frame % 600 == 0 {
            debug!(
                "frame {}: falloff {:.1}, {} particles",
                self.frame,
                distance,
                self.particles.len()
            );
        }

        &self.transforms
    }

    fn update_repulsion_change_distance(&mut self, pointer_moved: bool, dt_frames: f32) {
        if pointer_moved {
            self.repulsion_change_distance = self.settings.repulsion_reset_distance;
        } else {
            let decay = self.settings.repulsion_decay_per_frame * dt_frames.max(0.0);
            self.repulsion_change_distance = (self.repulsion_change_distance - decay).max(0.0);
        }
    }

    /// Static scene description for a renderer.
    pub fn scene(&self) -> Scene {
        Scene {
            width: self.viewport.width,
            height: self.viewport.height,
            background: self.settings.background,
            sprites: self.particles.iter().map(Particle::sprite).collect(),
        }
    }

    /// Hands the current transforms to `renderer`.
    pub fn render<R: Renderer + ?Sized>(&self, renderer: &mut R) -> Result<(), R::Error> {
        renderer.draw(self.frame, &self.transforms)
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn transforms(&self) -> &[Transform] {
        &self.transforms
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    pub fn repulsion_change_distance(&self) -> f32 {
        self.repulsion_change_distance
    }
}

/// Scale that fits the image into the padded viewport.
pub fn image_scale(image_width: u32, image_height: u32, viewport: Viewport) -> f32 {
    let fit_x = (viewport.width - viewport.padding * 2.0) / image_width as f32;
    let fit_y = (viewport.height - viewport.padding * 2.0) / image_height as f32;
    fit_x.min(fit_y)
}

/// Screen offset of the image's top-left corner.
///
/// Centers a square working area on the longer axis, then applies padding.
pub fn image_offset(viewport: Viewport) -> Vec2 {
    let side = viewport.width.min(viewport.height);
    Vec2::new(
        (viewport.width - side) / 2.0 + viewport.padding,
        (viewport.height - side) / 2.0 + viewport.padding,
    )
}

/// One particle per visible sampled pixel, in row-major order.
fn build_population<S, R>(image: &S, viewport: Viewport, stride: u32, rng: &mut R) -> Vec<Particle>
where
    S: ImageSampler + ?Sized,
    R: Rng + ?Sized,
{
    let scale = image_scale(image.width(), image.height(), viewport);
    let offset = image_offset(viewport);
    let columns = image.width().div_ceil(stride);
    let rows = image.height().div_ceil(stride);

    let mut particles = Vec::new();
    for j in 0..rows {
        for i in 0..columns {
            let (x, y) = (i * stride, j * stride);
            let color = image.pixel(x, y);
            if color.is_transparent() {
                continue;
            }
            let origin = Vec2::new(x as f32, y as f32) * scale + offset;
            particles.push(Particle::new(origin, scale, color, rng));
        }
    }
    particles
}

#[cfg(test)]
mod tests {
    use super::*;
    use pixelswarm_core::{PixelBuffer, Rgba, Sprite};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn checker(width: u32, height: u32) -> PixelBuffer {
        PixelBuffer::from_fn(width, height, |x, y| {
            if (x * 7 + y * 3) % 5 == 0 {
                Rgba::TRANSPARENT
            } else {
                Rgba::new((x * 10) as u8, (y * 10) as u8, 128, 200)
            }
        })
    }

    fn rng() -> StdRng {
        StdRng::seed_from_u64(2024)
    }

    #[derive(Default)]
    struct RecordingRenderer {
        scenes: Vec<Scene>,
        frames: Vec<(u64, Vec<Transform>)>,
    }

    impl Renderer for RecordingRenderer {
        type Error = ();

        fn build_scene(&mut self, scene: &Scene) -> Result<(), ()> {
            self.scenes.push(scene.clone());
            Ok(())
        }

        fn draw(&mut self, frame: u64, transforms: &[Transform]) -> Result<(), ()> {
            self.frames.push((frame, transforms.to_vec()));
            Ok(())
        }
    }

    #[test]
    fn particle_count_matches_visible_pixels() {
        for (w, h) in [(1, 1), (5, 3), (16, 9), (31, 17)] {
            let img = checker(w, h);
            let system = ParticleSystem::new(&img, Viewport::new(800.0, 600.0), &mut rng()).unwrap();
            assert_eq!(system.len(), img.opaque_count(), "{}x{}", w, h);
        }
    }

    #[test]
    fn two_by_one_image_yields_single_particle() {
        let img = PixelBuffer::from_fn(2, 1, |x, _| {
            if x == 0 { Rgba::opaque(255, 0, 0) } else { Rgba::new(0, 255, 0, 0) }
        });
        let viewport = Viewport::new(100.0, 100.0);
        let system = ParticleSystem::new(&img, viewport, &mut rng()).unwrap();

        assert_eq!(system.len(), 1);
        // scale = min(80 / 2, 80 / 1) = 40, square viewport so no centering offset
        let particle = &system.particles()[0];
        assert_eq!(particle.origin_position(), Vec2::new(10.0, 10.0));
        assert_eq!(particle.origin_scale(), 40.0);
        assert_eq!(particle.color(), Rgba::opaque(255, 0, 0));
    }

    #[test]
    fn origins_follow_screen_mapping_in_row_major_order() {
        let img = PixelBuffer::from_fn(3, 2, |_, _| Rgba::opaque(1, 1, 1));
        let viewport = Viewport::new(200.0, 100.0).with_padding(5.0);
        let system = ParticleSystem::new(&img, viewport, &mut rng()).unwrap();

        // scale = min(190 / 3, 90 / 2) = 45; offset = ((200 - 100) / 2 + 5, 0 + 5)
        let scale = image_scale(3, 2, viewport);
        assert_eq!(scale, 45.0);
        assert_eq!(image_offset(viewport), Vec2::new(55.0, 5.0));

        let origins: Vec<Vec2> = system.particles().iter().map(|p| p.origin_position()).collect();
        assert_eq!(
            origins,
            vec![
                Vec2::new(55.0, 5.0),
                Vec2::new(100.0, 5.0),
                Vec2::new(145.0, 5.0),
                Vec2::new(55.0, 50.0),
                Vec2::new(100.0, 50.0),
                Vec2::new(145.0, 50.0),
            ]
        );
    }

    #[test]
    fn particle_size_strides_the_sampling_grid() {
        let img = PixelBuffer::from_fn(5, 4, |_, _| Rgba::opaque(9, 9, 9));
        let settings = SystemSettings { particle_size: 2, ..SystemSettings::default() };
        let viewport = Viewport::new(100.0, 100.0).with_padding(0.0);
        let system = ParticleSystem::with_settings(&img, viewport, settings, &mut rng()).unwrap();

        // columns 0, 2, 4 and rows 0, 2
        assert_eq!(system.len(), 6);
        let scale = image_scale(5, 4, viewport);
        assert_eq!(system.particles()[1].origin_position(), Vec2::new(2.0 * scale, 0.0));
        assert_eq!(system.particles()[3].origin_position(), Vec2::new(0.0, 2.0 * scale));
    }

    #[test]
    fn rejects_degenerate_configuration() {
        let empty = PixelBuffer::from_fn(0, 10, |_, _| Rgba::TRANSPARENT);
        assert!(matches!(
            ParticleSystem::new(&empty, Viewport::new(100.0, 100.0), &mut rng()),
            Err(SystemError::EmptyImage { width: 0, height: 10 })
        ));

        let img = checker(4, 4);
        assert!(matches!(
            ParticleSystem::new(&img, Viewport::new(0.0, 100.0), &mut rng()),
            Err(SystemError::InvalidViewport { .. })
        ));
        assert!(matches!(
            ParticleSystem::new(&img, Viewport::new(100.0, 100.0).with_padding(50.0), &mut rng()),
            Err(SystemError::PaddingTooLarge { .. })
        ));
        let settings = SystemSettings { particle_size: 0, ..SystemSettings::default() };
        assert!(matches!(
            ParticleSystem::with_settings(&img, Viewport::new(100.0, 100.0), settings, &mut rng()),
            Err(SystemError::InvalidParticleSize)
        ));
    }

    #[test]
    fn all_transparent_image_builds_empty_system() {
        let img = PixelBuffer::from_fn(4, 4, |_, _| Rgba::TRANSPARENT);
        let mut system = ParticleSystem::new(&img, Viewport::new(100.0, 100.0), &mut rng()).unwrap();
        assert!(system.is_empty());
        assert!(system.tick(Vec2::ZERO, true, 1.0).is_empty());
    }

    #[test]
    fn falloff_starts_at_reset_distance_and_decays() {
        let img = checker(4, 4);
        let mut system = ParticleSystem::new(&img, Viewport::new(100.0, 100.0), &mut rng()).unwrap();
        assert_eq!(system.repulsion_change_distance(), 80.0);

        system.tick(Vec2::ZERO, false, 1.0);
        assert_eq!(system.repulsion_change_distance(), 78.5);
        system.tick(Vec2::ZERO, false, 2.0);
        assert_eq!(system.repulsion_change_distance(), 75.5);
    }

    #[test]
    fn falloff_is_non_increasing_between_moves_and_resets_on_move() {
        let img = checker(6, 6);
        let mut system = ParticleSystem::new(&img, Viewport::new(300.0, 300.0), &mut rng()).unwrap();
        let mut previous = system.repulsion_change_distance();

        for frame in 0..200u32 {
            let moved = frame % 70 == 69;
            let dt = 0.5 + (frame % 3) as f32 * 0.75;
            system.tick(Vec2::new(150.0, 150.0), moved, dt);
            let current = system.repulsion_change_distance();
            if moved {
                assert_eq!(current, 80.0);
            } else {
                assert!(current <= previous);
                assert!(current >= 0.0);
            }
            previous = current;
        }
    }

    #[test]
    fn move_resets_falloff_before_repulsion_check() {
        let img = PixelBuffer::from_fn(1, 1, |_, _| Rgba::opaque(0, 0, 0));
        let viewport = Viewport::new(100.0, 100.0);
        let mut system = ParticleSystem::new(&img, viewport, &mut rng())
            .unwrap()
            .with_repulsion_change_distance(0.0);
        assert_eq!(system.repulsion_change_distance(), 0.0);

        let origin = system.particles()[0].origin_position();
        system.tick(origin + Vec2::new(5.0, 0.0), true, 1.0);

        assert_eq!(system.repulsion_change_distance(), 80.0);
        // The particle took the near branch this very tick.
        assert!((system.particles()[0].mouse_repulsion_factor() - 0.49).abs() < 1e-6);
    }

    #[test]
    fn settles_when_pointer_stays_far() {
        let img = checker(12, 8);
        let viewport = Viewport::new(400.0, 300.0);
        let mut system = ParticleSystem::new(&img, viewport, &mut rng())
            .unwrap()
            .with_repulsion_change_distance(0.0);
        let pointer = Vec2::new(-1000.0, -1000.0);

        for _ in 0..1000 {
            system.tick(pointer, false, 1.0);
        }

        for particle in system.particles() {
            assert!(particle.position().distance(particle.origin_position()) < 0.5);
            assert!(particle.velocity().length() < 0.01);
        }
    }

    #[test]
    fn parallel_and_sequential_ticks_agree() {
        let img = checker(20, 20);
        let viewport = Viewport::new(640.0, 480.0);
        let sequential_settings =
            SystemSettings { parallel_threshold: usize::MAX, ..SystemSettings::default() };
        let parallel_settings = SystemSettings { parallel_threshold: 0, ..SystemSettings::default() };

        let mut sequential =
            ParticleSystem::with_settings(&img, viewport, sequential_settings, &mut rng()).unwrap();
        let mut parallel =
            ParticleSystem::with_settings(&img, viewport, parallel_settings, &mut rng()).unwrap();

        for frame in 0..120 {
            let pointer = Vec2::new(200.0 + frame as f32 * 2.0, 200.0);
            let moved = frame % 10 == 0;
            let a = sequential.tick(pointer, moved, 1.0).to_vec();
            let b = parallel.tick(pointer, moved, 1.0).to_vec();
            assert_eq!(a, b);
        }
    }

    #[test]
    fn transforms_are_never_negative_scale() {
        let img = checker(10, 10);
        let mut system = ParticleSystem::new(&img, Viewport::new(200.0, 200.0), &mut rng()).unwrap();
        for frame in 0..300 {
            let pointer = Vec2::new(100.0 + (frame as f32 * 0.3).sin() * 60.0, 100.0);
            for transform in system.tick(pointer, frame % 4 == 0, 1.0) {
                assert!(transform.scale >= 0.0);
            }
        }
    }

    #[test]
    fn render_hands_over_scene_and_transforms() {
        let img = PixelBuffer::from_fn(2, 2, |x, y| Rgba::opaque((x * 100) as u8, (y * 100) as u8, 7));
        let mut system = ParticleSystem::new(&img, Viewport::new(100.0, 100.0), &mut rng()).unwrap();
        let mut renderer = RecordingRenderer::default();

        renderer.build_scene(&system.scene()).unwrap();
        system.tick(Vec2::new(50.0, 50.0), true, 1.0);
        system.render(&mut renderer).unwrap();

        let scene = &renderer.scenes[0];
        assert_eq!(scene.background, 0xFFFFFF);
        assert_eq!(scene.sprites.len(), 4);
        assert_eq!(
            scene.sprites[1],
            Sprite { origin: Vec2::new(50.0, 10.0), scale: 40.0, tint: 0x640007 }
        );
        assert_eq!(renderer.frames.len(), 1);
        assert_eq!(renderer.frames[0].0, 1);
        assert_eq!(renderer.frames[0].1, system.transforms());
    }
}
