//! Turns a loaded [`Config`] into the pieces the frame loop drives.

use glam::Vec2;
use log::info;
use pixelswarm_config::{Config, PointerConfig, SenderConfig, SerializerType, TransportConfig};
use pixelswarm_core::PixelBuffer;
use pixelswarm_simulation::pointer::PointerPath;
use pixelswarm_simulation::{SystemSettings, Viewport};
use pixelswarm_transport::{
    BinarySerializer, FileSender, JsonSerializer, NullSender, Sender, Serializer, StdioSender,
    StreamRenderer, TransportError,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::Path;

use crate::RunnerError;

/// Decodes the source image into 8-bit RGBA.
pub fn load_image(path: &Path) -> Result<PixelBuffer, RunnerError> {
    let decoded = image::open(path)?.into_rgba8();
    let (width, height) = decoded.dimensions();
    info!("Loaded {}x{} image from {}", width, height, path.display());
    Ok(PixelBuffer::from_raw(width, height, decoded.into_raw())?)
}

/// Seeded generator for the population; a random seed is picked and logged
/// when none is configured so the run can be reproduced.
pub fn create_rng(seed: Option<u64>) -> StdRng {
    let seed = seed.unwrap_or_else(rand::random);
    info!("Using random seed {}", seed);
    StdRng::seed_from_u64(seed)
}

pub fn viewport(config: &Config) -> Viewport {
    Viewport::new(config.viewport.width, config.viewport.height).with_padding(config.viewport.padding)
}

pub fn system_settings(config: &Config) -> SystemSettings {
    SystemSettings {
        particle_size: config.image.particle_size,
        repulsion_reset_distance: config.simulation.repulsion_reset_distance,
        repulsion_decay_per_frame: config.simulation.repulsion_decay_per_frame,
        parallel_threshold: config.simulation.parallel_threshold,
        background: config.viewport.background_color,
    }
}

pub fn pointer_path(config: &PointerConfig) -> PointerPath {
    match config {
        PointerConfig::Idle => PointerPath::Idle,
        PointerConfig::Fixed { x, y } => PointerPath::Fixed(Vec2::new(*x, *y)),
        PointerConfig::Orbit { center_x, center_y, radius, period_frames } => PointerPath::Orbit {
            center: Vec2::new(*center_x, *center_y),
            radius: *radius,
            period_frames: *period_frames,
        },
        PointerConfig::Waypoints { points, frames_per_leg, looped } => PointerPath::Waypoints {
            points: points.iter().map(|&p| Vec2::from(p)).collect(),
            frames_per_leg: *frames_per_leg,
            looped: *looped,
        },
    }
}

pub fn create_serializer(serializer: SerializerType) -> Box<dyn Serializer> {
    match serializer {
        SerializerType::Json => Box::new(JsonSerializer),
        SerializerType::Binary => Box::new(BinarySerializer),
    }
}

#[allow(unused_variables)]
pub fn create_sender(sender: &SenderConfig) -> Result<Box<dyn Sender>, TransportError> {
    match sender {
        SenderConfig::Stdio => Ok(Box::new(StdioSender::new())),
        SenderConfig::File { path } => Ok(Box::new(FileSender::new(path)?)),
        SenderConfig::Null => Ok(Box::new(NullSender)),
        SenderConfig::WebSocket { host, port } => {
            #[cfg(feature = "websocket")]
            {
                let mut ws_sender = pixelswarm_transport::WebSocketSender::new(host, *port)?;
                ws_sender.start()?;
                info!("Open the front end at ws://{} to view the swarm", ws_sender.local_addr());
                Ok(Box::new(ws_sender))
            }

            #[cfg(not(feature = "websocket"))]
            {
                Err(TransportError::Configuration(
                    "WebSocket sender configured but websocket feature is not enabled".to_string(),
                ))
            }
        }
    }
}

pub fn create_renderer(transport: &TransportConfig) -> Result<StreamRenderer, TransportError> {
    let serializer = create_serializer(transport.serializer);
    let sender = create_sender(&transport.sender)?;
    Ok(StreamRenderer::new(serializer, sender).with_update_frequency(transport.update_frequency))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pixelswarm_core::{ImageSampler, Rgba};
    use rand::Rng;

    #[test]
    fn loads_png_as_rgba() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tiny.png");
        let mut img = image::RgbaImage::new(3, 2);
        img.put_pixel(0, 0, image::Rgba([255, 0, 0, 255]));
        img.put_pixel(2, 1, image::Rgba([0, 0, 255, 128]));
        img.save(&path).unwrap();

        let buffer = load_image(&path).unwrap();
        assert_eq!((buffer.width(), buffer.height()), (3, 2));
        assert_eq!(buffer.pixel(0, 0), Rgba::new(255, 0, 0, 255));
        assert_eq!(buffer.pixel(2, 1), Rgba::new(0, 0, 255, 128));
        assert_eq!(buffer.opaque_count(), 2);
    }

    #[test]
    fn missing_image_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(load_image(&dir.path().join("nope.png")), Err(RunnerError::Image(_))));
    }

    #[test]
    fn same_seed_same_stream() {
        let a: [u32; 4] = create_rng(Some(5)).gen();
        let b: [u32; 4] = create_rng(Some(5)).gen();
        assert_eq!(a, b);
    }

    #[test]
    fn pointer_config_maps_to_path() {
        let path = pointer_path(&PointerConfig::Waypoints {
            points: vec![[1.0, 2.0], [3.0, 4.0]],
            frames_per_leg: 10,
            looped: false,
        });
        assert_eq!(
            path,
            PointerPath::Waypoints {
                points: vec![Vec2::new(1.0, 2.0), Vec2::new(3.0, 4.0)],
                frames_per_leg: 10,
                looped: false,
            }
        );
        assert_eq!(pointer_path(&PointerConfig::Fixed { x: 5.0, y: 6.0 }), PointerPath::Fixed(Vec2::new(5.0, 6.0)));
    }

    #[test]
    fn null_transport_builds() {
        let transport = TransportConfig {
            serializer: SerializerType::Binary,
            sender: SenderConfig::Null,
            update_frequency: 2,
        };
        let renderer = create_renderer(&transport).unwrap();
        assert_eq!(renderer.frames_sent(), 0);
    }
}
