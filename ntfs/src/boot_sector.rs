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
use zerocopy::little_endian::{U16, U64};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

#[repr(C)]
#[derive(Debug, Clone, FromBytes, IntoBytes, KnownLayout, Immutable)]
struct RawBootSector {
    bs_jmp_boot: [u8; 3],
    bs_oem_id: [u8; 8],
    bytes_per_sector: U16,
    sectors_per_cluster: u8,
    reserved_sectors: U16,
    always_zero_a: [u8; 3],
    unused_fat16: U16,
    media: u8,
    unused_sectors_per_fat: U16,
    sectors_per_track: U16,
    number_of_heads: U16,
    hidden_sectors: [u8; 4],
    unused_b: [u8; 4],
    unused_signature: [u8; 4],
    total_sectors: U64,
    mft_cluster: U64,
    mft_mirror_cluster: U64,
    clusters_per_file_record_segment: u8,
    reserved_c: [u8; 3],
    clusters_per_index_buffer: u8,
    reserved_d: [u8; 3],
    volume_serial: U64,
    checksum: [u8; 4],
    boot_code: [u8; 426],
    signature: [u8; 2],
}

#[derive(Debug, Clone, Copy)]
pub struct NtfsBootSector {
    pub bytes_per_sector: u16,
    pub sectors_per_cluster: u8,
    pub reserved_sectors: u16,
    pub total_sectors: u64,
    pub mft_cluster: u64,
    pub mft_mirror_cluster: u64,
    pub record_size: u32,
    pub serial_number: u64,
}

impl NtfsBootSector {
    pub fn parse(sector: &[u8]) -> Result<Self> {
        if sector.len() < 512 {
            return Err(Error::CorruptBootSector("sector shorter than 512 bytes"));
        }
        let raw = RawBootSector::read_from_bytes(&sector[..512])
            .map_err(|_| Error::CorruptBootSector("boot sector did not parse"))?;

        if raw.signature != [0x55, 0xAA] {
            return Err(Error::NotThisFilesystem);
        }
        if &raw.bs_oem_id != b"NTFS    " {
            return Err(Error::NotThisFilesystem);
        }
        if raw.bytes_per_sector.get() == 0 || raw.sectors_per_cluster == 0 {
            return Err(Error::CorruptBootSector("zero bytes-per-sector or sectors-per-cluster"));
        }

        let bytes_per_cluster = raw.bytes_per_sector.get() as u32 * raw.sectors_per_cluster as u32;
        let record_size = decode_size_shift(raw.clusters_per_file_record_segment, bytes_per_cluster);

        Ok(Self {
            bytes_per_sector: raw.bytes_per_sector.get(),
            sectors_per_cluster: raw.sectors_per_cluster,
            reserved_sectors: raw.reserved_sectors.get(),
            total_sectors: raw.total_sectors.get(),
            mft_cluster: raw.mft_cluster.get(),
            mft_mirror_cluster: raw.mft_mirror_cluster.get(),
            record_size,
            serial_number: raw.volume_serial.get(),
        })
    }

    pub fn bytes_per_cluster(&self) -> u64 {
        self.bytes_per_sector as u64 * self.sectors_per_cluster as u64
    }

    pub fn cluster_offset(&self, cluster: u64) -> u64 {
        cluster * self.bytes_per_cluster()
    }
}

/// NTFS overloads this byte: a positive count of clusters, or a negative
/// power-of-two byte size stored as a signed 8-bit value.
fn decode_size_shift(raw: u8, bytes_per_cluster: u32) -> u32 {
    let signed = raw as i8;
    if signed > 0 {
        signed as u32 * bytes_per_cluster
    } else {
        1u32 << (-signed as u32)
    }
}
