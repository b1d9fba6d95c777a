//! Random-access reads through an access-point index.

use std::io::{Read, Seek, SeekFrom};

use log::debug;

use crate::error::{Error, Result};
use crate::index::{read_chunk, AccessPoint, CHUNK_SIZE};
use crate::inflate::{Container, Flush, Inflater};
use crate::window::{WindowSource, WINDOW_SIZE};

/// Position of the access point with the greatest uncompressed offset not
/// past `offset`.
pub fn locate(points: &[AccessPoint], offset: u64) -> Option<usize> {
    points
        .partition_point(|point| point.uncompressed_offset <= offset)
        .checked_sub(1)
}

/// Fills `buf` with decompressed bytes starting at `offset`.
///
/// Returns the number of bytes produced, short only when the decompressed
/// stream ends first. Every call starts a fresh raw inflater at the nearest
/// preceding access point, so `input`'s position is moved and not restored.
pub fn extract<R, W>(
    input: &mut R,
    points: &[AccessPoint],
    windows: &mut W,
    offset: u64,
    buf: &mut [u8],
) -> Result<usize>
where
    R: Read + Seek,
    W: WindowSource + ?Sized,
{
    let end = points
        .last()
        .map(|point| point.uncompressed_offset)
        .ok_or(Error::EmptyIndex)?;
    if buf.is_empty() || offset >= end {
        return Ok(0);
    }

    let position = locate(points, offset)
        .ok_or_else(|| Error::corrupt("index does not start at offset 0"))?;
    let point = points[position];
    debug!(
        "extract {} bytes at {}: resume from point {} (out={} in={} bits={})",
        buf.len(),
        offset,
        position,
        point.uncompressed_offset,
        point.compressed_offset,
        point.bits
    );

    let mut inflater = Inflater::new(Container::Raw)?;
    resume(input, &mut inflater, &point)?;
    inflater.set_dictionary(windows.window(position)?)?;

    let mut skip = offset - point.uncompressed_offset;
    let mut discard = vec![0u8; WINDOW_SIZE];
    let mut chunk = vec![0u8; CHUNK_SIZE];
    let mut pos = 0;
    let mut filled = 0;
    let mut delivered = 0;

    loop {
        if pos == filled {
            filled = read_chunk(input, &mut chunk)?;
            pos = 0;
            if filled == 0 {
                return Err(Error::corrupt("compressed stream truncated"));
            }
        }

        let progress = if skip > 0 {
            let want = skip.min(WINDOW_SIZE as u64) as usize;
            let progress = inflater.inflate(&chunk[pos..filled], &mut discard[..want], Flush::None)?;
            skip -= progress.produced as u64;
            progress
        } else {
            let progress = inflater.inflate(&chunk[pos..filled], &mut buf[delivered..], Flush::None)?;
            delivered += progress.produced;
            progress
        };
        pos += progress.consumed;

        if progress.consumed == 0 && progress.produced == 0 && !progress.stream_end {
            return Err(Error::corrupt("inflate stalled"));
        }
        if progress.stream_end || (skip == 0 && delivered == buf.len()) {
            break;
        }
    }

    Ok(delivered)
}

/// Positions `input` at the access point and primes any leftover bits.
fn resume<R: Read + Seek>(input: &mut R, inflater: &mut Inflater, point: &AccessPoint) -> Result<()> {
    if point.bits == 0 {
        input.seek(SeekFrom::Start(point.compressed_offset))?;
        return Ok(());
    }
    let start = point
        .compressed_offset
        .checked_sub(1)
        .ok_or_else(|| Error::corrupt("bit offset without a preceding byte"))?;
    input.seek(SeekFrom::Start(start))?;
    let mut byte = [0u8; 1];
    input
        .read_exact(&mut byte)
        .map_err(|err| Error::from_read(err, "compressed stream"))?;
    inflater.prime(point.bits, byte[0] >> (8 - point.bits))
}
