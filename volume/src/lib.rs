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

//! Probes a raw volume and dispatches to whichever decoder recognizes it,
//! so the shell can drive one `Volume` trait object without caring which
//! on-disk format it is talking to.

use blockfs_core::{DirListing, Volume as VolumeTrait};
use blockfs_device::{open_device, BlockDevice};
use blockfs_err::{Error, Result};
use blockfs_fat32::Fat32Volume;
use blockfs_ntfs::NtfsVolume;

pub enum Volume {
    Fat32(Fat32Volume),
    Ntfs(NtfsVolume),
}

/// Opens a raw device path, probes its boot sector, and mounts it with the
/// matching decoder.
pub fn open(path: &str) -> Result<Volume> {
    let device = open_device(path)?;
    open_with(path, Box::new(device))
}

/// Same probe, for a caller that already has a `BlockDevice` (tests, or a
/// non-file backend). `name` is the volume name as the caller addressed it
/// (e.g. `"C:"`); NTFS paths that repeat it as their first segment are
/// anchored at root instead of resolved relative to cwd.
pub fn open_with(name: &str, device: Box<dyn BlockDevice>) -> Result<Volume> {
    let mut sector = vec![0u8; 512];
    device.read_at(0, &mut sector)?;

    if sector.len() >= 11 && &sector[3..11] == b"NTFS    " {
        log::info!("probed NTFS signature");
        return Ok(Volume::Ntfs(NtfsVolume::open(name, device)?));
    }
    if sector.len() >= 90 && &sector[82..90] == b"FAT32   " {
        log::info!("probed FAT32 signature");
        return Ok(Volume::Fat32(Fat32Volume::open(device)?));
    }

    Err(Error::UnsupportedVolume)
}

impl VolumeTrait for Volume {
    fn list(&self, path: &str) -> Result<DirListing> {
        match self {
            Volume::Fat32(v) => v.list(path),
            Volume::Ntfs(v) => v.list(path),
        }
    }

    fn change_dir(&self, path: &str) -> Result<()> {
        match self {
            Volume::Fat32(v) => v.change_dir(path),
            Volume::Ntfs(v) => v.change_dir(path),
        }
    }

    fn cwd(&self) -> String {
        match self {
            Volume::Fat32(v) => v.cwd(),
            Volume::Ntfs(v) => v.cwd(),
        }
    }

    fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        match self {
            Volume::Fat32(v) => v.read_file(path),
            Volume::Ntfs(v) => v.read_file(path),
        }
    }

    fn describe(&self) -> String {
        match self {
            Volume::Fat32(v) => v.describe(),
            Volume::Ntfs(v) => v.describe(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blockfs_device::MemoryBlockDevice;

    #[test]
    fn rejects_unrecognized_boot_sector() {
        let image = vec![0u8; 512];
        let err = open_with("", Box::new(MemoryBlockDevice::new(image))).unwrap_err();
        assert!(matches!(err, Error::UnsupportedVolume));
    }

    #[test]
    fn probes_ntfs_oem_id() {
        let mut image = vec![0u8; 4096];
        image[3..11].copy_from_slice(b"NTFS    ");
        image[11..13].copy_from_slice(&512u16.to_le_bytes());
        image[13] = 1;
        image[0x30..0x38].copy_from_slice(&2u64.to_le_bytes());
        image[0x40] = (-10i8) as u8;
        image[510..512].copy_from_slice(&[0x55, 0xAA]);
        // cluster 2 (offset 1024) holds a minimal, empty-looking $MFT record
        // 0; it must at least carry the FILE signature to parse.
        image[1024..1028].copy_from_slice(b"FILE");
        image[1024 + 20..1024 + 22].copy_from_slice(&56u16.to_le_bytes());
        image[1024 + 56..1024 + 60].copy_from_slice(&0xFFFF_FFFFu32.to_le_bytes());
        image[1024 + 24..1024 + 28].copy_from_slice(&64u32.to_le_bytes());

        let result = open_with("", Box::new(MemoryBlockDevice::new(image)));
        assert!(matches!(result, Err(Error::CorruptRecord(_))));
    }
}
