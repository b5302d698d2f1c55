//! The deferred surface must produce exactly what the blocking one does.

use pretty_assertions::assert_eq;
use rasterkit::{deferred, AnimatedImage, Error, GifConfig, Image, LoopCount};

fn frames() -> Vec<AnimatedImage> {
    (0..3u8)
        .map(|i| {
            let mut data = Vec::new();
            for p in 0..12u8 {
                data.extend_from_slice(&[p * 20, i * 60, 255 - p, 255]);
            }
            AnimatedImage::new(Image::new(4, 3, data).unwrap(), 10 + i as u32)
        })
        .collect()
}

#[tokio::test]
async fn test_encoders_match_blocking() {
    let frames = frames();
    assert_eq!(
        deferred::encode_gif(frames.clone()).await.unwrap(),
        rasterkit::encode_gif(&frames).unwrap()
    );
    assert_eq!(
        deferred::encode_apng(frames.clone()).await.unwrap(),
        rasterkit::encode_apng(&frames).unwrap()
    );

    let config = GifConfig {
        loop_count: LoopCount::Finite(1),
        interlace: true,
        ..GifConfig::default()
    };
    assert_eq!(
        deferred::encode_gif_with(frames.clone(), config.clone())
            .await
            .unwrap(),
        rasterkit::encode_gif_with(&frames, config).unwrap()
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_decoders_match_blocking() {
    let frames = frames();
    let gif = rasterkit::encode_gif(&frames).unwrap();
    let png = rasterkit::encode_apng(&frames).unwrap();

    let (from_gif, from_png) = tokio::join!(
        deferred::decode_gif(gif.clone()),
        deferred::decode_png(png.clone())
    );
    assert_eq!(from_gif.unwrap(), rasterkit::decode_gif(&gif).unwrap());
    assert_eq!(from_png.unwrap(), rasterkit::decode_png(&png).unwrap());
}

#[tokio::test]
async fn test_raster_ops_match_blocking() {
    let image = frames().remove(1).into_image();
    let overlay = Image::filled(2, 2, [9, 9, 9, 100]).unwrap();

    assert_eq!(
        deferred::resize_image(image.clone(), 7).await.unwrap(),
        rasterkit::resize_image(&image, 7).unwrap()
    );
    assert_eq!(
        deferred::composite_image(image.clone(), overlay.clone(), -1, 2)
            .await
            .unwrap(),
        rasterkit::composite_image(&image, &overlay, -1, 2).unwrap()
    );
}

#[tokio::test]
async fn test_failures_are_rejected_results() {
    let err = deferred::resize_image(Image::filled(1, 1, [0; 4]).unwrap(), 0)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidDimensions(_)));

    let err = deferred::decode_gif(b"GIF89a".to_vec()).await.unwrap_err();
    assert!(matches!(err, Error::CorruptStream(_)));
}
