//! Streams the particle scene to an out-of-process renderer.
//!
//! A [`StreamRenderer`] pairs a [`Serializer`] (JSON or binary) with a
//! [`Sender`] (stdout, file, nothing, or WebSocket clients) and implements the
//! core [`Renderer`] trait on top of them.

use bytes::{BufMut, BytesMut};
use log::info;
use pixelswarm_core::{Renderer, Scene, Transform};
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use thiserror::Error;

#[cfg(feature = "websocket")]
mod websocket;
#[cfg(feature = "websocket")]
pub use websocket::WebSocketSender;

// --- Error Type ---
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Binary serialization error: {0}")]
    Binary(#[from] bincode::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[cfg(feature = "websocket")]
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

// --- Traits ---

/// Turns scene and frame data into a text message.
pub trait Serializer: Send + Sync {
    fn serialize_scene(&self, scene: &Scene) -> Result<String, TransportError>;
    fn serialize_frame(&self, frame: u64, transforms: &[Transform]) -> Result<String, TransportError>;
}

/// Sends serialized data to a destination.
pub trait Sender {
    fn send(&mut self, data: &[u8]) -> Result<(), TransportError>;

    fn flush(&mut self) -> Result<(), TransportError> {
        Ok(())
    }

    /// Connected viewers, for senders that have them.
    fn client_count(&self) -> Option<usize> {
        None
    }
}

// --- Serializers ---

#[derive(Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum Message<'a> {
    Scene(&'a Scene),
    Frame { frame: u64, transforms: &'a [Transform] },
}

/// One JSON object per message, tagged with `"kind"`.
pub struct JsonSerializer;

impl Serializer for JsonSerializer {
    fn serialize_scene(&self, scene: &Scene) -> Result<String, TransportError> {
        Ok(serde_json::to_string(&Message::Scene(scene))?)
    }

    fn serialize_frame(&self, frame: u64, transforms: &[Transform]) -> Result<String, TransportError> {
        Ok(serde_json::to_string(&Message::Frame { frame, transforms })?)
    }
}

pub const SCENE_TAG: u8 = 0;
pub const FRAME_TAG: u8 = 1;

/// Compact little-endian messages, base64 encoded for line-based senders.
///
/// Every message starts with a one-byte tag.
/// - Scene (`0`): the bincode-encoded [`Scene`].
/// - Frame (`1`):
///   - 8 bytes: frame number as u64
///   - 4 bytes: particle count as u32
///   - For each particle: x, y and scale as f32
pub struct BinarySerializer;

impl BinarySerializer {
    pub fn encode_frame(frame: u64, transforms: &[Transform]) -> BytesMut {
        let mut buffer = BytesMut::with_capacity(1 + 8 + 4 + transforms.len() * 12);
        buffer.put_u8(FRAME_TAG);
        buffer.put_u64_le(frame);
        buffer.put_u32_le(transforms.len() as u32);
        for transform in transforms {
            buffer.put_f32_le(transform.position.x);
            buffer.put_f32_le(transform.position.y);
            buffer.put_f32_le(transform.scale);
        }
        buffer
    }
}

impl Serializer for BinarySerializer {
    fn serialize_scene(&self, scene: &Scene) -> Result<String, TransportError> {
        let body = bincode::serialize(scene)?;
        let mut buffer = BytesMut::with_capacity(1 + body.len());
        buffer.put_u8(SCENE_TAG);
        buffer.put_slice(&body);
        Ok(base64::encode(&buffer))
    }

    fn serialize_frame(&self, frame: u64, transforms: &[Transform]) -> Result<String, TransportError> {
        Ok(base64::encode(Self::encode_frame(frame, transforms)))
    }
}

// --- Senders ---

/// Writes each message as a line on standard output.
pub struct StdioSender {
    stdout: io::Stdout,
}

impl StdioSender {
    pub fn new() -> Self {
        StdioSender { stdout: io::stdout() }
    }
}

impl Default for StdioSender {
    fn default() -> Self {
        Self::new()
    }
}

impl Sender for StdioSender {
    fn send(&mut self, data: &[u8]) -> Result<(), TransportError> {
        let mut lock = self.stdout.lock();
        lock.write_all(data)?;
        lock.write_all(b"\n")?;
        lock.flush()?;
        Ok(())
    }
}

/// Appends each message as a line to a file, truncating it on creation.
pub struct FileSender {
    writer: BufWriter<File>,
}

impl FileSender {
    pub fn new(path: &Path) -> Result<Self, TransportError> {
        let file = File::create(path)?;
        info!("Initialized FileSender for path: {}", path.display());
        Ok(Self { writer: BufWriter::new(file) })
    }
}

impl Sender for FileSender {
    fn send(&mut self, data: &[u8]) -> Result<(), TransportError> {
        self.writer.write_all(data)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), TransportError> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Discards everything. Useful for headless benchmarking.
#[derive(Default)]
pub struct NullSender;

impl Sender for NullSender {
    fn send(&mut self, _data: &[u8]) -> Result<(), TransportError> {
        Ok(())
    }
}

// --- Renderer ---

/// [`Renderer`] that serializes the scene and frames and pushes them through a sender.
pub struct StreamRenderer {
    serializer: Box<dyn Serializer>,
    sender: Box<dyn Sender>,
    update_frequency: u32,
    frames_sent: u64,
}

impl StreamRenderer {
    pub fn new(serializer: Box<dyn Serializer>, sender: Box<dyn Sender>) -> Self {
        Self { serializer, sender, update_frequency: 1, frames_sent: 0 }
    }

    /// Only send every n-th frame.
    pub fn with_update_frequency(mut self, update_frequency: u32) -> Self {
        self.update_frequency = update_frequency.max(1);
        self
    }

    pub fn frames_sent(&self) -> u64 {
        self.frames_sent
    }

    pub fn client_count(&self) -> Option<usize> {
        self.sender.client_count()
    }

    pub fn flush(&mut self) -> Result<(), TransportError> {
        self.sender.flush()
    }
}

impl Renderer for StreamRenderer {
    type Error = TransportError;

    fn build_scene(&mut self, scene: &Scene) -> Result<(), TransportError> {
        let data = self.serializer.serialize_scene(scene)?;
        self.sender.send(data.as_bytes())?;
        info!("Sent scene with {} sprites", scene.sprites.len());
        Ok(())
    }

    fn draw(&mut self, frame: u64, transforms: &[Transform]) -> Result<(), TransportError> {
        if frame % self.update_frequency as u64 != 0 {
            return Ok(());
        }
        let data = self.serializer.serialize_frame(frame, transforms)?;
        self.sender.send(data.as_bytes())?;
        self.frames_sent += 1;
        Ok(())
    }
}
