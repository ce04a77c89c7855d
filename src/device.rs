// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Block device access.
//!
//! The host storage stack owns the device; this crate only consumes a
//! narrow read interface. Everything above this module works in terms
//! of possibly unaligned byte ranges and relies on [`read_range`] to
//! expand them to block boundaries.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

use crate::error::Result;
use crate::util::align_to;

/// Read-only random access to a formatted block device.
///
/// `offset` and the buffer length passed to [`BlockDevice::read`] must
/// both be multiples of [`BlockDevice::block_size`].
pub trait BlockDevice {
    /// The minimum aligned I/O unit, typically 512.
    fn block_size(&self) -> u32;

    /// Fill `buf` from the device starting at `offset`.
    fn read(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<()>;
}

/// An owned buffer holding one aligned read, exposing the unaligned
/// sub-range that was actually asked for.
pub struct IoBuffer {
    data: Vec<u8>,
    inset: usize,
    len: usize,
}

impl IoBuffer {
    /// The requested bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.data[self.inset..self.inset + self.len]
    }
}

/// Read `len` bytes at `offset`, expanding the request to the device's
/// block boundaries. One read call per range.
pub(crate) fn read_range<D: BlockDevice + ?Sized>(
    dev: &mut D,
    offset: u64,
    len: usize,
) -> Result<IoBuffer> {
    let bs = u64::from(dev.block_size());
    let inset = (offset % bs) as usize;
    let aligned_len = align_to(inset as u64 + len as u64, bs) as usize;

    let mut data = vec![0u8; aligned_len];
    dev.read(offset - inset as u64, &mut data)?;

    Ok(IoBuffer { data, inset, len })
}

/// A file-backed device with 512-byte blocks, for tools and tests.
pub struct FileDevice {
    file: File,
}

impl FileDevice {
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<FileDevice> {
        Ok(FileDevice {
            file: File::open(path)?,
        })
    }
}

impl BlockDevice for FileDevice {
    fn block_size(&self) -> u32 {
        512
    }

    fn read(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(buf)
    }
}
