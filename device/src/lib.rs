// Copyright 2026 blockfs contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Seekable, byte-addressable storage that the filesystem decoders read from.
//!
//! This mirrors the teacher's `hyrax_ds::DataStorage` split: a small trait
//! implementations plug into, plus one "real" backend (a file, standing in
//! for a raw device path such as `\\.\C:`) and one in-memory backend used to
//! build synthetic volumes in tests.

use std::fs::{File, OpenOptions};

use blockfs_err::{Error, Result};
use log::error;

/// Single public operation: read `buffer.len()` bytes at absolute byte
/// offset `offset`. Not thread-safe; callers serialize access.
pub trait BlockDevice {
    fn read_at(&self, offset: u64, buffer: &mut [u8]) -> Result<()>;
}

/// Opens a raw volume by platform-specific path, e.g. `\\.\C:` on Windows or
/// a device/image path on Unix. The single injectable opener named in the
/// Volume contract — callers that want a different backend (a loopback
/// image, a network block store) implement `BlockDevice` directly instead of
/// going through this function.
pub fn open_device(volume_name: &str) -> Result<FileBlockDevice> {
    FileBlockDevice::open(volume_name)
}

pub struct FileBlockDevice {
    file: File,
}

impl FileBlockDevice {
    pub fn open(path: &str) -> Result<Self> {
        let path = normalize_path(path);
        let file = OpenOptions::new().read(true).open(&*path)?;
        Ok(Self { file })
    }
}

#[cfg(unix)]
fn normalize_path(path: &str) -> std::borrow::Cow<'_, str> {
    std::borrow::Cow::Borrowed(path)
}

#[cfg(windows)]
fn normalize_path(path: &str) -> std::borrow::Cow<'_, str> {
    if path.starts_with(r"\\.\") {
        std::borrow::Cow::Borrowed(path)
    } else {
        std::borrow::Cow::Owned(format!(r"\\.\{}:", path.trim_end_matches(':')))
    }
}

#[cfg(unix)]
impl BlockDevice for FileBlockDevice {
    fn read_at(&self, offset: u64, buffer: &mut [u8]) -> Result<()> {
        use std::os::unix::fs::FileExt;

        self.file.read_exact_at(buffer, offset).map_err(|e| {
            error!("read_at({offset}, {} bytes) failed: {e}", buffer.len());
            Error::Io(e)
        })
    }
}

#[cfg(windows)]
impl BlockDevice for FileBlockDevice {
    fn read_at(&self, offset: u64, mut buffer: &mut [u8]) -> Result<()> {
        use std::os::windows::fs::FileExt;

        let mut pos = offset;
        while !buffer.is_empty() {
            let read = self.file.seek_read(buffer, pos).map_err(|e| {
                error!("read_at({offset}, {} bytes) failed: {e}", buffer.len());
                Error::Io(e)
            })?;
            if read == 0 {
                return Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "short read",
                )));
            }
            buffer = &mut buffer[read..];
            pos += read as u64;
        }
        Ok(())
    }
}

/// A `Vec<u8>`-backed device for hand-assembled synthetic volumes in tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryBlockDevice {
    data: Vec<u8>,
}

impl MemoryBlockDevice {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }
}

impl BlockDevice for MemoryBlockDevice {
    fn read_at(&self, offset: u64, buffer: &mut [u8]) -> Result<()> {
        let offset = offset as usize;
        let end = offset
            .checked_add(buffer.len())
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| {
                error!(
                    "read_at({offset}, {} bytes) out of range (len={})",
                    buffer.len(),
                    self.data.len()
                );
                Error::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "read past end of memory device",
                ))
            })?;
        buffer.copy_from_slice(&self.data[offset..end]);
        Ok(())
    }
}
