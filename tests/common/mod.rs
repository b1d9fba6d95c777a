#![allow(dead_code)]

use std::io::{Read, Write};

use flate2::read::GzDecoder;
use flate2::write::{GzEncoder, ZlibEncoder};
use flate2::Compression;

/// Deterministic text-like data that compresses to many deflate blocks.
pub fn sample(len: usize) -> Vec<u8> {
    let mut state: u32 = 0x9e37_79b9;
    let words = [
        &b"header "[..],
        b"voxel ",
        b"slice\n",
        b"intensity ",
        b"affine ",
        b"qform ",
    ];
    let mut out = Vec::with_capacity(len + 16);
    while out.len() < len {
        state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
        out.extend_from_slice(words[(state >> 20) as usize % words.len()]);
        out.push((state >> 8) as u8);
    }
    out.truncate(len);
    out
}

pub fn gzip(data: &[u8], level: Compression) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), level);
    encoder.write_all(data).expect("gzip write");
    encoder.finish().expect("gzip finish")
}

pub fn zlib(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).expect("zlib write");
    encoder.finish().expect("zlib finish")
}

/// Reference sequential decompression.
pub fn gunzip(compressed: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    GzDecoder::new(compressed)
        .read_to_end(&mut out)
        .expect("gunzip");
    out
}
