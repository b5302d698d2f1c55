//! Deferred operations.
//!
//! Each function moves its inputs onto tokio's blocking pool and resolves
//! once the work is done, so an async caller is never blocked by a codec.
//! Results are identical to the blocking functions at the crate root.
//!
//! These functions must be awaited inside a tokio runtime.
//!
//! ```no_run
//! # async fn demo(frames: Vec<rasterkit::AnimatedImage>) -> rasterkit::Result<()> {
//! let gif = rasterkit::deferred::encode_gif(frames).await?;
//! let frames = rasterkit::deferred::decode_gif(gif).await?;
//! assert!(!frames.is_empty());
//! # Ok(())
//! # }
//! ```

use std::borrow::Cow;

use rasterkit_core::{AnimatedImage, Error, Image, Result};
use rasterkit_images::gif::GifConfig;
use rasterkit_images::png::ApngConfig;
use tracing::error;

use crate::tasks::{self, Composite, DecodeGif, DecodePng, EncodeApng, EncodeGif, Resize, Task};

/// Run any task on the blocking pool.
///
/// A panic inside the task, or a runtime shutting down underneath it, is
/// reported as [`Error::Worker`].
pub async fn spawn<T>(task: T) -> Result<T::Output>
where
    T: Task + Send + 'static,
    T::Output: Send + 'static,
{
    match tokio::task::spawn_blocking(move || tasks::run(&task)).await {
        Ok(result) => result,
        Err(join_error) => {
            error!(task = T::NAME, error = %join_error, "worker did not complete");
            Err(Error::Worker(format!("{}: {}", T::NAME, join_error)))
        }
    }
}

/// Deferred [`crate::resize_image`].
pub async fn resize_image(image: Image, target_width: u32) -> Result<Image> {
    spawn(Resize {
        image: Cow::Owned(image),
        target_width,
    })
    .await
}

/// Deferred [`crate::composite_image`].
pub async fn composite_image(image: Image, overlay: Image, x: i64, y: i64) -> Result<Image> {
    spawn(Composite {
        image: Cow::Owned(image),
        overlay: Cow::Owned(overlay),
        x,
        y,
    })
    .await
}

/// Deferred [`crate::encode_apng`].
pub async fn encode_apng(frames: Vec<AnimatedImage>) -> Result<Vec<u8>> {
    encode_apng_with(frames, ApngConfig::default()).await
}

/// Deferred [`crate::encode_apng_with`].
pub async fn encode_apng_with(frames: Vec<AnimatedImage>, config: ApngConfig) -> Result<Vec<u8>> {
    spawn(EncodeApng {
        frames: Cow::Owned(frames),
        config,
    })
    .await
}

/// Deferred [`crate::encode_gif`].
pub async fn encode_gif(frames: Vec<AnimatedImage>) -> Result<Vec<u8>> {
    encode_gif_with(frames, GifConfig::default()).await
}

/// Deferred [`crate::encode_gif_with`].
pub async fn encode_gif_with(frames: Vec<AnimatedImage>, config: GifConfig) -> Result<Vec<u8>> {
    spawn(EncodeGif {
        frames: Cow::Owned(frames),
        config,
    })
    .await
}

/// Deferred [`crate::decode_gif`].
pub async fn decode_gif(data: Vec<u8>) -> Result<Vec<AnimatedImage>> {
    spawn(DecodeGif {
        data: Cow::Owned(data),
    })
    .await
}

/// Deferred [`crate::decode_png`].
pub async fn decode_png(data: Vec<u8>) -> Result<Vec<AnimatedImage>> {
    spawn(DecodePng {
        data: Cow::Owned(data),
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Panics;

    impl Task for Panics {
        type Output = ();
        const NAME: &'static str = "panics";

        fn compute(&self) -> Result<()> {
            panic!("worker blew up");
        }
    }

    #[tokio::test]
    async fn test_panic_becomes_worker_error() {
        let result = spawn(Panics).await;
        match result {
            Err(Error::Worker(msg)) => assert!(msg.starts_with("panics")),
            other => panic!("expected worker error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_errors_are_returned_not_raised() {
        let result = decode_png(b"\x88PNG\r\n\x1a\n".to_vec()).await;
        assert!(matches!(result, Err(Error::CorruptStream(_))));
        let result = encode_gif(Vec::new()).await;
        assert!(matches!(result, Err(Error::InvalidDimensions(_))));
    }

    #[tokio::test]
    async fn test_resize_matches_blocking() {
        let image = Image::filled(6, 3, [1, 2, 3, 4]).unwrap();
        let blocking = crate::resize_image(&image, 4).unwrap();
        let deferred = resize_image(image, 4).await.unwrap();
        assert_eq!(blocking, deferred);
    }
}
