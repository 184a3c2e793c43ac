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

use blockfs_err::{Error, Result};
use zerocopy::little_endian::{U16, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// The 512-byte BIOS Parameter Block, laid out exactly as it appears at the
/// start of the volume. Field order is load-bearing: it is what gives each
/// field its offset.
#[repr(C)]
#[derive(Debug, Clone, FromBytes, IntoBytes, KnownLayout, Immutable)]
struct RawBootSector {
    bs_jmp_boot: [u8; 3],
    bs_oem_name: [u8; 8],
    bpb_bytes_per_sector: U16,
    bpb_sectors_per_cluster: u8,
    bpb_reserved_sector_count: U16,
    bpb_num_fats: u8,
    bpb_root_entry_count: U16,
    bpb_total_sectors_16: U16,
    bpb_media: u8,
    bpb_fat_size_16: U16,
    bpb_sectors_per_track: U16,
    bpb_num_heads: U16,
    bpb_hidden_sectors: U32,
    bpb_total_sectors_32: U32,
    bpb_fat_size_32: U32,
    bpb_ext_flags: U16,
    bpb_fs_version: U16,
    bpb_root_cluster: U32,
    bpb_fs_info: U16,
    bpb_backup_boot_sector: U16,
    bpb_reserved: [u8; 12],
    bs_drive_number: u8,
    bs_reserved1: u8,
    bs_boot_signature: u8,
    bs_volume_id: U32,
    bs_volume_label: [u8; 11],
    bs_fs_type: [u8; 8],
    boot_code: [u8; 420],
    signature: [u8; 2],
}

/// The subset of the FAT32 BPB this crate actually needs, already converted
/// to native integers.
#[derive(Debug, Clone, Copy)]
pub struct Fat32BootSector {
    pub bytes_per_sector: u16,
    pub sectors_per_cluster: u8,
    pub reserved_sectors: u16,
    pub fat_count: u8,
    pub sectors_per_fat: u32,
    pub sectors_in_volume: u32,
    pub root_cluster: u32,
    /// The `BS_FS_Type` label, always `"FAT32   "` once `parse` has accepted
    /// the sector. Kept around so `describe()` can show it verbatim.
    pub fs_type_label: String,
}

impl Fat32BootSector {
    pub fn parse(sector: &[u8]) -> Result<Self> {
        if sector.len() < 512 {
            return Err(Error::CorruptBootSector("sector shorter than 512 bytes"));
        }
        let raw = RawBootSector::read_from_bytes(&sector[..512])
            .map_err(|_| Error::CorruptBootSector("boot sector did not parse"))?;

        if raw.signature != [0x55, 0xAA] {
            return Err(Error::NotThisFilesystem);
        }
        if &raw.bs_fs_type != b"FAT32   " {
            return Err(Error::NotThisFilesystem);
        }
        if raw.bpb_bytes_per_sector.get() == 0 || raw.bpb_sectors_per_cluster == 0 {
            return Err(Error::CorruptBootSector("zero bytes-per-sector or sectors-per-cluster"));
        }
        if raw.bpb_fat_size_32.get() == 0 {
            return Err(Error::CorruptBootSector("FAT32 volume reports zero-length FAT"));
        }

        let sectors_in_volume = if raw.bpb_total_sectors_16.get() != 0 {
            raw.bpb_total_sectors_16.get() as u32
        } else {
            raw.bpb_total_sectors_32.get()
        };

        Ok(Self {
            bytes_per_sector: raw.bpb_bytes_per_sector.get(),
            sectors_per_cluster: raw.bpb_sectors_per_cluster,
            reserved_sectors: raw.bpb_reserved_sector_count.get(),
            fat_count: raw.bpb_num_fats,
            sectors_per_fat: raw.bpb_fat_size_32.get(),
            sectors_in_volume,
            root_cluster: raw.bpb_root_cluster.get(),
            fs_type_label: String::from_utf8_lossy(&raw.bs_fs_type).into_owned(),
        })
    }

    /// Byte offset of the start of the FAT region.
    pub fn fat_region_offset(&self) -> u64 {
        self.reserved_sectors as u64 * self.bytes_per_sector as u64
    }

    /// Byte offset of the start of the data region — the derived "Starting
    /// Sector of Data" field.
    pub fn data_region_sector(&self) -> u32 {
        self.reserved_sectors as u32 + self.fat_count as u32 * self.sectors_per_fat
    }

    /// Byte offset of cluster 2, the first data cluster.
    pub fn data_region_offset(&self) -> u64 {
        self.fat_region_offset()
            + self.fat_count as u64 * self.sectors_per_fat as u64 * self.bytes_per_sector as u64
    }

    pub fn bytes_per_cluster(&self) -> u64 {
        self.bytes_per_sector as u64 * self.sectors_per_cluster as u64
    }

    /// Byte offset of the start of cluster `cluster` (cluster numbers start at 2).
    pub fn cluster_offset(&self, cluster: u32) -> u64 {
        self.data_region_offset() + (cluster as u64 - 2) * self.bytes_per_cluster()
    }

    /// Count of data clusters, used to bound FAT chain traversal.
    pub fn cluster_count(&self) -> u32 {
        let data_sectors = self.sectors_in_volume as u64
            - self.reserved_sectors as u64
            - self.fat_count as u64 * self.sectors_per_fat as u64;
        (data_sectors / self.sectors_per_cluster as u64) as u32
    }
}
