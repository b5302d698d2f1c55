//! One computation per public operation.
//!
//! Each task owns or borrows its inputs through [`Cow`], so the blocking
//! functions run a borrowed task in place while the deferred functions move
//! an owned one onto a worker thread. Both paths end in the same
//! [`Task::compute`].

use std::borrow::Cow;
use std::time::Instant;

use rasterkit_core::{AnimatedImage, Image, Result};
use rasterkit_images::gif::{GifConfig, GifEncoder};
use rasterkit_images::png::{ApngConfig, ApngEncoder, PngDecoder};
use rasterkit_images::GifDecoder;
use tracing::{debug, warn};

use crate::{composite, resize};

/// A self-contained operation.
pub trait Task {
    /// Value produced on success.
    type Output;

    /// Name used in logs and worker errors.
    const NAME: &'static str;

    /// Run the operation on the current thread.
    fn compute(&self) -> Result<Self::Output>;
}

/// Run a task on the current thread, logging its outcome.
pub fn run<T: Task>(task: &T) -> Result<T::Output> {
    let start = Instant::now();
    let result = task.compute();
    let elapsed_us = start.elapsed().as_micros() as u64;
    match &result {
        Ok(_) => debug!(task = T::NAME, elapsed_us, "task finished"),
        Err(err) => warn!(task = T::NAME, elapsed_us, error = %err, "task failed"),
    }
    result
}

/// Bilinear resize to a target width.
#[derive(Debug, Clone)]
pub struct Resize<'a> {
    /// Source image.
    pub image: Cow<'a, Image>,
    /// Output width; the height follows the aspect ratio.
    pub target_width: u32,
}

impl Task for Resize<'_> {
    type Output = Image;
    const NAME: &'static str = "resize";

    fn compute(&self) -> Result<Image> {
        resize::resize(&self.image, self.target_width)
    }
}

/// Source-over composite of one image onto another.
#[derive(Debug, Clone)]
pub struct Composite<'a> {
    /// Destination image; also fixes the output size.
    pub image: Cow<'a, Image>,
    /// Image drawn on top.
    pub overlay: Cow<'a, Image>,
    /// Left offset of the overlay.
    pub x: i64,
    /// Top offset of the overlay.
    pub y: i64,
}

impl Task for Composite<'_> {
    type Output = Image;
    const NAME: &'static str = "composite";

    fn compute(&self) -> Result<Image> {
        composite::composite(&self.image, &self.overlay, self.x, self.y)
    }
}

/// GIF89a encode.
#[derive(Debug, Clone)]
pub struct EncodeGif<'a> {
    /// Frames in display order.
    pub frames: Cow<'a, [AnimatedImage]>,
    /// Encoder settings.
    pub config: GifConfig,
}

impl Task for EncodeGif<'_> {
    type Output = Vec<u8>;
    const NAME: &'static str = "encode_gif";

    fn compute(&self) -> Result<Vec<u8>> {
        GifEncoder::with_config(self.config.clone()).encode(&self.frames)
    }
}

/// APNG encode.
#[derive(Debug, Clone)]
pub struct EncodeApng<'a> {
    /// Frames in display order.
    pub frames: Cow<'a, [AnimatedImage]>,
    /// Encoder settings.
    pub config: ApngConfig,
}

impl Task for EncodeApng<'_> {
    type Output = Vec<u8>;
    const NAME: &'static str = "encode_apng";

    fn compute(&self) -> Result<Vec<u8>> {
        ApngEncoder::with_config(self.config.clone()).encode(&self.frames)
    }
}

/// GIF decode.
#[derive(Debug, Clone)]
pub struct DecodeGif<'a> {
    /// Complete GIF stream.
    pub data: Cow<'a, [u8]>,
}

impl Task for DecodeGif<'_> {
    type Output = Vec<AnimatedImage>;
    const NAME: &'static str = "decode_gif";

    fn compute(&self) -> Result<Vec<AnimatedImage>> {
        GifDecoder::new().decode(&self.data)
    }
}

/// PNG/APNG decode.
#[derive(Debug, Clone)]
pub struct DecodePng<'a> {
    /// Complete PNG stream.
    pub data: Cow<'a, [u8]>,
}

impl Task for DecodePng<'_> {
    type Output = Vec<AnimatedImage>;
    const NAME: &'static str = "decode_png";

    fn compute(&self) -> Result<Vec<AnimatedImage>> {
        PngDecoder::new().decode(&self.data)
    }
}
