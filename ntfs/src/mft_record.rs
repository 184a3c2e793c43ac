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

use blockfs_core::{AttrSet, Timestamp};
use chrono::{NaiveDate, NaiveDateTime};

const ATTR_STANDARD_INFORMATION: u32 = 0x10;
const ATTR_FILE_NAME: u32 = 0x30;
const ATTR_DATA: u32 = 0x80;
const ATTR_INDEX_ROOT: u32 = 0x90;
const ATTR_END: u32 = 0xFFFF_FFFF;

const FILE_NAME_NAMESPACE_DOS: u8 = 0x02;

const FLAG_IN_USE: u16 = 0x0001;
const FLAG_DIRECTORY: u16 = 0x0002;

fn u16_at(b: &[u8], off: usize) -> u16 {
    u16::from_le_bytes(b[off..off + 2].try_into().unwrap())
}
fn u32_at(b: &[u8], off: usize) -> u32 {
    u32::from_le_bytes(b[off..off + 4].try_into().unwrap())
}
fn u64_at(b: &[u8], off: usize) -> u64 {
    u64::from_le_bytes(b[off..off + 8].try_into().unwrap())
}

/// Undoes the update sequence array fixup NTFS applies to every record and
/// index buffer, restoring the last two bytes of each on-disk sector. Logs
/// and continues on a checksum mismatch rather than failing the whole record:
/// forensic reads should recover what they can.
pub fn apply_usa_fixup(record: &mut [u8]) {
    if record.len() < 8 {
        return;
    }
    let usa_offset = u16_at(record, 4) as usize;
    let usa_count = u16_at(record, 6) as usize;
    if usa_count == 0 || usa_offset + usa_count * 2 > record.len() {
        return;
    }
    let usn = [record[usa_offset], record[usa_offset + 1]];
    for i in 0..usa_count.saturating_sub(1) {
        let sector_end = (i + 1) * 512 - 2;
        if sector_end + 2 > record.len() {
            break;
        }
        if record[sector_end] != usn[0] || record[sector_end + 1] != usn[1] {
            log::warn!("MFT record fixup checksum mismatch in sector {i}");
        }
        let repl_off = usa_offset + 2 + i * 2;
        record[sector_end] = record[repl_off];
        record[sector_end + 1] = record[repl_off + 1];
    }
}

/// A decoded `$DATA` attribute: either the file's bytes inline, or a
/// reference to the first cluster run that holds them. Only the first run
/// is kept — a deliberate limitation carried over from the tool this reads
/// like a forensic triage pass rather than a full extractor; multi-run
/// (fragmented) files are reported as `UnsupportedLayout` by the caller
/// instead of read short.
#[derive(Debug, Clone)]
pub enum DataDescriptor {
    Resident(Vec<u8>),
    NonResident { first_run_cluster: Option<u64>, first_run_cluster_count: u64, real_size: u64 },
}

#[derive(Debug, Clone)]
pub struct FileRecord {
    pub in_use: bool,
    pub is_directory: bool,
    pub parent_id: Option<u64>,
    pub name: Option<String>,
    pub created: Option<Timestamp>,
    pub modified: Option<Timestamp>,
    pub accessed: Option<Timestamp>,
    /// DOS-style attribute bits from `$STANDARD_INFORMATION`. Does not carry
    /// `AttrSet::DIRECTORY`; that comes from the record header's flags.
    pub attrs: AttrSet,
    pub data: Option<DataDescriptor>,
}

/// Parses one fixed-size MFT record slab. Returns `None` for a slot whose
/// signature isn't `FILE` (never allocated, or corrupt).
pub fn parse_record(bytes: &[u8]) -> Option<FileRecord> {
    if bytes.len() < 48 || &bytes[0..4] != b"FILE" {
        return None;
    }

    let flags = u16_at(bytes, 22);
    let first_attr_offset = u16_at(bytes, 20) as usize;
    let used_size = (u32_at(bytes, 24) as usize).min(bytes.len());

    let mut record = FileRecord {
        in_use: flags & FLAG_IN_USE != 0,
        is_directory: flags & FLAG_DIRECTORY != 0,
        parent_id: None,
        name: None,
        created: None,
        modified: None,
        accessed: None,
        attrs: AttrSet::empty(),
        data: None,
    };

    let mut pos = first_attr_offset;
    let mut best_name_namespace: Option<u8> = None;

    while pos + 16 <= used_size {
        let attr_type = u32_at(bytes, pos);
        if attr_type == ATTR_END {
            break;
        }
        let length = u32_at(bytes, pos + 4) as usize;
        if length == 0 || pos + length > used_size {
            break;
        }
        let non_resident = bytes[pos + 8] != 0;

        match attr_type {
            ATTR_STANDARD_INFORMATION if !non_resident => {
                let value_offset = u16_at(bytes, pos + 20) as usize;
                let value = &bytes[pos + value_offset..];
                if value.len() >= 32 {
                    record.created = Some(filetime_to_timestamp(u64_at(value, 0)));
                    record.modified = Some(filetime_to_timestamp(u64_at(value, 8)));
                    record.accessed = Some(filetime_to_timestamp(u64_at(value, 24)));
                }
                if value.len() >= 36 {
                    record.attrs = AttrSet::from_bits_truncate(u32_at(value, 32) as u16);
                }
            }
            ATTR_FILE_NAME if !non_resident => {
                let value_offset = u16_at(bytes, pos + 20) as usize;
                let value = &bytes[pos + value_offset..];
                if value.len() >= 66 {
                    let namespace = value[65];
                    let keep = match best_name_namespace {
                        None => true,
                        Some(FILE_NAME_NAMESPACE_DOS) => namespace != FILE_NAME_NAMESPACE_DOS,
                        Some(_) => false,
                    };
                    if keep {
                        let parent_id = u64_at(value, 0) & 0x0000_FFFF_FFFF_FFFF;
                        let name_len_chars = value[64] as usize;
                        let name_bytes_end = 66 + name_len_chars * 2;
                        if value.len() >= name_bytes_end {
                            let units: Vec<u16> = value[66..name_bytes_end]
                                .chunks_exact(2)
                                .map(|c| u16::from_le_bytes([c[0], c[1]]))
                                .collect();
                            record.name = Some(String::from_utf16_lossy(&units));
                            record.parent_id = Some(parent_id);
                            best_name_namespace = Some(namespace);
                        }
                    }
                }
            }
            ATTR_DATA => {
                let name_length = bytes[pos + 9];
                if name_length == 0 {
                    record.data = Some(decode_data_attribute(bytes, pos, non_resident));
                }
            }
            ATTR_INDEX_ROOT => {
                record.is_directory = true;
            }
            _ => {}
        }

        pos += length;
    }

    Some(record)
}

fn decode_data_attribute(bytes: &[u8], pos: usize, non_resident: bool) -> DataDescriptor {
    if non_resident {
        let data_run_offset = u16_at(bytes, pos + 32) as usize;
        let real_size = u64_at(bytes, pos + 48);
        let length = u32_at(bytes, pos + 4) as usize;
        let runs_bytes = &bytes[pos + data_run_offset..pos + length];
        let (first_run_cluster, first_run_cluster_count) =
            decode_data_runs(runs_bytes).into_iter().next().unwrap_or((None, 0));
        DataDescriptor::NonResident { first_run_cluster, first_run_cluster_count, real_size }
    } else {
        let value_length = u32_at(bytes, pos + 16) as usize;
        let value_offset = u16_at(bytes, pos + 20) as usize;
        DataDescriptor::Resident(bytes[pos + value_offset..pos + value_offset + value_length].to_vec())
    }
}

/// Decodes an NTFS data-run list: variable-width (length, LCN-delta) pairs
/// terminated by a zero header byte. A zero offset-size nibble marks a
/// sparse run with no on-disk backing.
pub fn decode_data_runs(bytes: &[u8]) -> Vec<(Option<u64>, u64)> {
    let mut runs = Vec::new();
    let mut pos = 0usize;
    let mut current_lcn: i64 = 0;

    while pos < bytes.len() {
        let header = bytes[pos];
        if header == 0 {
            break;
        }
        let length_size = (header & 0x0F) as usize;
        let offset_size = ((header >> 4) & 0x0F) as usize;
        pos += 1;

        if pos + length_size > bytes.len() {
            break;
        }
        let length = read_le_unsigned(&bytes[pos..pos + length_size]);
        pos += length_size;

        if offset_size == 0 {
            runs.push((None, length));
            continue;
        }
        if pos + offset_size > bytes.len() {
            break;
        }
        let delta = read_le_signed(&bytes[pos..pos + offset_size]);
        pos += offset_size;
        current_lcn += delta;
        runs.push((Some(current_lcn as u64), length));
    }

    runs
}

fn read_le_unsigned(bytes: &[u8]) -> u64 {
    let mut v = 0u64;
    for (i, b) in bytes.iter().enumerate() {
        v |= (*b as u64) << (8 * i);
    }
    v
}

fn read_le_signed(bytes: &[u8]) -> i64 {
    let v = read_le_unsigned(bytes) as i64;
    let bits = bytes.len() * 8;
    if bits < 64 && (v & (1i64 << (bits - 1))) != 0 {
        v - (1i64 << bits)
    } else {
        v
    }
}

const FILETIME_UNIX_EPOCH_DIFF_100NS: u64 = 116_444_736_000_000_000;

/// Converts a Windows FILETIME (100ns intervals since 1601-01-01) to a
/// calendar timestamp. Values before 1970 clamp to the Unix epoch.
pub fn filetime_to_timestamp(filetime: u64) -> Timestamp {
    if filetime < FILETIME_UNIX_EPOCH_DIFF_100NS {
        return Timestamp::from_naive(unix_epoch());
    }
    let unix_100ns = filetime - FILETIME_UNIX_EPOCH_DIFF_100NS;
    let secs = (unix_100ns / 10_000_000) as i64;
    let micros = ((unix_100ns % 10_000_000) / 10) as i64;
    let naive = NaiveDate::from_ymd_opt(1970, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        + chrono::Duration::seconds(secs)
        + chrono::Duration::microseconds(micros);
    Timestamp::from_naive(naive)
}

fn unix_epoch() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1970, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap()
}

/// Fallback timestamp for records missing `$STANDARD_INFORMATION`.
pub fn filetime_epoch() -> Timestamp {
    Timestamp::from_naive(unix_epoch())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_single_contiguous_run() {
        // header 0x21: offset_size=2, length_size=1; length=5, offset=+10
        let bytes = [0x21, 0x05, 0x0A, 0x00];
        let runs = decode_data_runs(&bytes);
        assert_eq!(runs, vec![(Some(10), 5)]);
    }

    #[test]
    fn decodes_sparse_run() {
        // header 0x01: offset_size=0 (sparse), length_size=1; length=3
        let bytes = [0x01, 0x03];
        let runs = decode_data_runs(&bytes);
        assert_eq!(runs, vec![(None, 3)]);
    }

    #[test]
    fn accumulates_lcn_deltas_across_runs() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&[0x21, 0x05, 0x0A, 0x00]); // +10 -> lcn 10
        bytes.extend_from_slice(&[0x21, 0x03, 0xF6, 0xFF]); // -10 -> lcn 0
        let runs = decode_data_runs(&bytes);
        assert_eq!(runs, vec![(Some(10), 5), (Some(0), 3)]);
    }

    #[test]
    fn filetime_round_trips_known_date() {
        // 2020-01-01 00:00:00 UTC
        let ft = 132_223_104_000_000_000u64;
        let ts = filetime_to_timestamp(ft);
        assert_eq!(ts.naive().format("%Y-%m-%d").to_string(), "2020-01-01");
    }

    #[test]
    fn usa_fixup_restores_sector_tail_bytes() {
        let mut record = vec![0u8; 1024];
        record[0..4].copy_from_slice(b"FILE");
        record[4..6].copy_from_slice(&48u16.to_le_bytes()); // usa_offset
        record[6..8].copy_from_slice(&3u16.to_le_bytes()); // usa_count (1 + 2 sectors)
        record[48..50].copy_from_slice(&[0xAB, 0xCD]); // usn
        record[50..52].copy_from_slice(&[0x11, 0x22]); // sector 0 real tail
        record[52..54].copy_from_slice(&[0x33, 0x44]); // sector 1 real tail
        record[510..512].copy_from_slice(&[0xAB, 0xCD]);
        record[1022..1024].copy_from_slice(&[0xAB, 0xCD]);

        apply_usa_fixup(&mut record);
        assert_eq!(&record[510..512], &[0x11, 0x22]);
        assert_eq!(&record[1022..1024], &[0x33, 0x44]);
    }
}
