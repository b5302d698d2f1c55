//! Property-based tests for the GIF and PNG decoders.

use proptest::prelude::*;
use rasterkit_images::gif::{decode_gif, encode_gif};
use rasterkit_images::png::{decode_png, encode_apng};
use rasterkit_images::{AnimatedImage, Image};

/// GIF header with a small logical screen and a 4-colour global table.
fn gif_prefix(width: u16, height: u16) -> Vec<u8> {
    let mut data = b"GIF89a".to_vec();
    data.extend_from_slice(&width.to_le_bytes());
    data.extend_from_slice(&height.to_le_bytes());
    data.extend_from_slice(&[0x81, 0, 0]);
    data.extend_from_slice(&[0, 0, 0, 255, 0, 0, 0, 255, 0, 0, 0, 255]);
    data
}

fn arb_frame() -> impl Strategy<Value = AnimatedImage> {
    (1u32..6, 1u32..6, 0u32..4, 0u32..4, any::<[u8; 3]>(), 0u32..300).prop_map(
        |(w, h, x, y, [r, g, b], delay)| {
            let image = Image::filled(w, h, [r, g, b, 255]).unwrap();
            AnimatedImage::new(image, delay).with_offset(x, y)
        },
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    /// Arbitrary blocks after a valid header never panic the GIF decoder.
    #[test]
    fn gif_decoder_tolerates_garbage(
        width in 1u16..32,
        height in 1u16..32,
        tail in prop::collection::vec(any::<u8>(), 0..256),
    ) {
        let mut data = gif_prefix(width, height);
        data.extend_from_slice(&tail);
        if let Ok(frames) = decode_gif(&data) {
            for frame in frames {
                prop_assert_eq!((frame.width(), frame.height()), (width as u32, height as u32));
            }
        }
    }

    /// Arbitrary bytes after the signature never panic the PNG decoder.
    #[test]
    fn png_decoder_tolerates_garbage(tail in prop::collection::vec(any::<u8>(), 0..256)) {
        let mut data = b"\x89PNG\r\n\x1a\n".to_vec();
        data.extend_from_slice(&tail);
        let _ = decode_png(&data);
    }

    /// Flipping one byte of a valid APNG yields frames or an error, never a panic.
    #[test]
    fn png_decoder_tolerates_bit_flips(index in any::<prop::sample::Index>(), mask in 1u8..=255) {
        let frames = vec![
            AnimatedImage::new(Image::filled(3, 2, [1, 2, 3, 255]).unwrap(), 5),
            AnimatedImage::new(Image::filled(1, 1, [9, 9, 9, 255]).unwrap(), 5).with_offset(2, 1),
        ];
        let mut data = encode_apng(&frames).unwrap();
        let at = index.index(data.len());
        data[at] ^= mask;
        let _ = decode_png(&data);
    }

    /// Offset frames decode to the same canvases through either format.
    #[test]
    fn formats_agree_on_composited_canvases(
        frames in prop::collection::vec(arb_frame(), 1..5)
    ) {
        let via_gif = decode_gif(&encode_gif(&frames).unwrap()).unwrap();
        let via_png = decode_png(&encode_apng(&frames).unwrap()).unwrap();
        prop_assert_eq!(via_gif.len(), frames.len());
        prop_assert_eq!(via_gif, via_png);
    }
}
