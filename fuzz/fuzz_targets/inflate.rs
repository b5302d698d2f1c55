#![no_main]

//! Fuzz target for DEFLATE and zlib.
//!
//! Arbitrary streams must never panic, and anything we compress must come
//! back unchanged.

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use rasterkit_core::deflate::{deflate, inflate, zlib_compress, zlib_decompress};
use rasterkit_core::CompressionLevel;

#[derive(Arbitrary, Debug)]
enum InflateInput {
    /// Decode untrusted raw DEFLATE.
    Raw(Vec<u8>),
    /// Decode untrusted zlib.
    Zlib(Vec<u8>),
    /// Compress then decompress.
    Roundtrip { data: Vec<u8>, level: u8 },
}

fuzz_target!(|input: InflateInput| {
    match input {
        InflateInput::Raw(data) => {
            let mut out = Vec::new();
            if let Ok(consumed) = inflate(&data, &mut out) {
                assert!(consumed <= data.len());
            }
        }
        InflateInput::Zlib(data) => {
            let _ = zlib_decompress(&data, 0);
        }
        InflateInput::Roundtrip { data, level } => {
            if data.len() > 1 << 20 {
                return;
            }
            let level = level % 10;

            let compressed = deflate(&data, level);
            let mut out = Vec::new();
            inflate(&compressed, &mut out).expect("own DEFLATE output must decode");
            assert_eq!(out, data);

            let zlib = zlib_compress(&data, CompressionLevel::Custom(level));
            let restored = zlib_decompress(&zlib, data.len()).expect("own zlib output must decode");
            assert_eq!(restored, data);
        }
    }
});
