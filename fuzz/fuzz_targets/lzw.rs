#![no_main]

//! Fuzz target for GIF-flavoured LZW.

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use rasterkit_core::lzw::{compress, decompress, min_code_size_for};

#[derive(Arbitrary, Debug)]
enum LzwInput {
    /// Decode untrusted codes.
    Decode {
        data: Vec<u8>,
        min_code_size: u8,
        max_len: u16,
    },
    /// Compress palette indices then decode them.
    Roundtrip { indices: Vec<u8>, colors: u16 },
}

fuzz_target!(|input: LzwInput| {
    match input {
        LzwInput::Decode {
            data,
            min_code_size,
            max_len,
        } => {
            if let Ok(out) = decompress(&data, min_code_size, max_len as usize) {
                assert!(out.len() <= max_len as usize);
            }
        }
        LzwInput::Roundtrip { indices, colors } => {
            let colors = (colors % 256) as usize + 1;
            let indices: Vec<u8> = indices.iter().map(|&i| (i as usize % colors) as u8).collect();
            let min_code_size = min_code_size_for(colors);

            let compressed = compress(&indices, min_code_size).expect("indices fit the code size");
            let decoded = decompress(&compressed, min_code_size, indices.len())
                .expect("own LZW output must decode");
            assert_eq!(decoded, indices);
        }
    }
});
