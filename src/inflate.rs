//! Safe wrapper over zlib's streaming inflate.
//!
//! `flate2` hides the pieces random access depends on (`Z_BLOCK`, the
//! `data_type` boundary report, `inflatePrime`), so this talks to zlib
//! through `libz-sys` directly. The `z_stream` is boxed: zlib keeps a
//! back-pointer to it inside its private state and rejects a moved stream.

use std::ffi::{c_int, c_uint, c_void, CStr};
use std::mem;
use std::ptr;

use libz_sys as zlib;
use log::trace;

use crate::error::{Error, Result};

/// Bit set in `data_type` when inflate stopped at a block boundary.
const DATA_TYPE_BOUNDARY: c_int = 128;
/// Bit set in `data_type` while inside the final deflate block.
const DATA_TYPE_LAST_BLOCK: c_int = 64;
/// Low bits of `data_type`: unused bits left in the last input byte.
const DATA_TYPE_BITS_MASK: c_int = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Container {
    /// zlib or gzip header, detected from the first bytes.
    Auto,
    /// Bare deflate data, no header or trailer.
    Raw,
}

impl Container {
    fn window_bits(self) -> c_int {
        match self {
            Container::Auto => 15 + 32,
            Container::Raw => -15,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flush {
    None,
    /// Return at every deflate block boundary.
    Block,
}

impl Flush {
    fn as_raw(self) -> c_int {
        match self {
            Flush::None => zlib::Z_NO_FLUSH,
            Flush::Block => zlib::Z_BLOCK,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Boundary {
    /// Bits of the byte before the next unconsumed input byte that belong
    /// to the following block (0..=7).
    pub bits: u8,
    /// The block just finished or about to start is the stream's last.
    pub last_block: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Progress {
    pub consumed: usize,
    pub produced: usize,
    pub stream_end: bool,
    pub boundary: Option<Boundary>,
}

pub(crate) struct Inflater {
    strm: Box<zlib::z_stream>,
}

extern "C" fn zalloc(_opaque: *mut c_void, items: c_uint, size: c_uint) -> *mut c_void {
    unsafe { libc::calloc(items as libc::size_t, size as libc::size_t) }
}

extern "C" fn zfree(_opaque: *mut c_void, address: *mut c_void) {
    unsafe { libc::free(address) }
}

impl Inflater {
    pub(crate) fn new(container: Container) -> Result<Self> {
        let mut strm = Box::new(zlib::z_stream {
            next_in: ptr::null_mut(),
            avail_in: 0,
            total_in: 0,
            next_out: ptr::null_mut(),
            avail_out: 0,
            total_out: 0,
            msg: ptr::null_mut(),
            state: ptr::null_mut(),
            zalloc,
            zfree,
            opaque: ptr::null_mut(),
            data_type: 0,
            adler: 0,
            reserved: 0,
        });
        let ret = unsafe {
            zlib::inflateInit2_(
                &mut *strm,
                container.window_bits(),
                zlib::zlibVersion(),
                mem::size_of::<zlib::z_stream>() as c_int,
            )
        };
        match ret {
            zlib::Z_OK => Ok(Self { strm }),
            zlib::Z_MEM_ERROR => Err(Error::OutOfMemory("inflate state")),
            code => Err(Error::corrupt(format!("inflate init failed ({code})"))),
        }
    }

    /// Feeds the top `bits` bits of the byte preceding a checkpoint so that
    /// decoding resumes mid-byte. `value` holds those bits shifted down.
    pub(crate) fn prime(&mut self, bits: u8, value: u8) -> Result<()> {
        let ret = unsafe { zlib::inflatePrime(&mut *self.strm, bits as c_int, value as c_int) };
        self.check_setup(ret, "inflate prime")
    }

    pub(crate) fn set_dictionary(&mut self, dictionary: &[u8]) -> Result<()> {
        let ret = unsafe {
            zlib::inflateSetDictionary(
                &mut *self.strm,
                dictionary.as_ptr(),
                dictionary.len() as c_uint,
            )
        };
        self.check_setup(ret, "inflate dictionary")
    }

    /// Runs one inflate call over `input`, writing into `output`.
    ///
    /// Neither slice is retained: the stream pointers are cleared before
    /// returning, zlib keeps its own copies of the bit buffer and window.
    pub(crate) fn inflate(&mut self, input: &[u8], output: &mut [u8], flush: Flush) -> Result<Progress> {
        let avail_in = input.len().min(c_uint::MAX as usize);
        let avail_out = output.len().min(c_uint::MAX as usize);
        self.strm.next_in = input.as_ptr() as *mut u8;
        self.strm.avail_in = avail_in as c_uint;
        self.strm.next_out = output.as_mut_ptr();
        self.strm.avail_out = avail_out as c_uint;

        let ret = unsafe { zlib::inflate(&mut *self.strm, flush.as_raw()) };

        let consumed = avail_in - self.strm.avail_in as usize;
        let produced = avail_out - self.strm.avail_out as usize;
        self.strm.next_in = ptr::null_mut();
        self.strm.avail_in = 0;
        self.strm.next_out = ptr::null_mut();
        self.strm.avail_out = 0;
        trace!("inflate ret={ret} consumed={consumed} produced={produced}");

        let stream_end = match ret {
            zlib::Z_OK | zlib::Z_BUF_ERROR => false,
            zlib::Z_STREAM_END => true,
            zlib::Z_NEED_DICT => {
                return Err(Error::corrupt("stream requires a preset dictionary"))
            }
            zlib::Z_MEM_ERROR => return Err(Error::OutOfMemory("inflate")),
            code => return Err(self.engine_error(code)),
        };

        let data_type = self.strm.data_type;
        let boundary = (data_type & DATA_TYPE_BOUNDARY != 0).then(|| Boundary {
            bits: (data_type & DATA_TYPE_BITS_MASK) as u8,
            last_block: data_type & DATA_TYPE_LAST_BLOCK != 0,
        });

        Ok(Progress {
            consumed,
            produced,
            stream_end,
            boundary,
        })
    }

    /// Unused-bit count reported by the last inflate call.
    pub(crate) fn pending_bits(&self) -> u8 {
        (self.strm.data_type & DATA_TYPE_BITS_MASK) as u8
    }

    fn check_setup(&self, ret: c_int, what: &str) -> Result<()> {
        match ret {
            zlib::Z_OK => Ok(()),
            zlib::Z_MEM_ERROR => Err(Error::OutOfMemory("inflate")),
            code => Err(Error::corrupt(format!("{what} failed ({code})"))),
        }
    }

    fn engine_error(&self, code: c_int) -> Error {
        let detail = if self.strm.msg.is_null() {
            format!("inflate failed ({code})")
        } else {
            let msg = unsafe { CStr::from_ptr(self.strm.msg) };
            msg.to_string_lossy().into_owned()
        };
        Error::Corrupt(detail)
    }
}

impl Drop for Inflater {
    fn drop(&mut self) {
        unsafe {
            zlib::inflateEnd(&mut *self.strm);
        }
    }
}
