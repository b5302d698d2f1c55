#![no_main]

//! Fuzz target for the GIF decoder.
//!
//! Any input must either decode into canvas-sized frames or fail with an
//! error; it must never panic.

use libfuzzer_sys::fuzz_target;
use rasterkit_images::gif::GifDecoder;

fuzz_target!(|data: &[u8]| {
    // Cap the logical screen so a tiny input cannot ask for gigabytes.
    if data.len() >= 10 {
        let width = u16::from_le_bytes([data[6], data[7]]) as u32;
        let height = u16::from_le_bytes([data[8], data[9]]) as u32;
        // A zero screen is sized from the first frame, which is unbounded.
        if width * height > 1 << 22 || width == 0 || height == 0 {
            return;
        }
    }

    let mut decoder = GifDecoder::new();
    if let Ok(frames) = decoder.decode(data) {
        let screen = decoder.screen_descriptor();
        for frame in &frames {
            assert_eq!(frame.data().len(), (frame.width() * frame.height() * 4) as usize);
            assert_eq!((frame.x, frame.y), (0, 0));
            if let Some(screen) = screen.filter(|s| s.width > 0 && s.height > 0) {
                assert_eq!(frame.width(), screen.width as u32);
                assert_eq!(frame.height(), screen.height as u32);
            }
        }
    }
});
