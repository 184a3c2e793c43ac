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
use chrono::NaiveDate;
use zerocopy::little_endian::U16;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

const ATTR_LONG_NAME: u8 = 0x0F;

#[repr(C)]
#[derive(Debug, Clone, FromBytes, IntoBytes, KnownLayout, Immutable)]
struct RawShortEntry {
    name: [u8; 8],
    ext: [u8; 3],
    attr: u8,
    nt_reserved: u8,
    create_time_tenth: u8,
    create_time: U16,
    create_date: U16,
    last_access_date: U16,
    first_cluster_hi: U16,
    write_time: U16,
    write_date: U16,
    first_cluster_lo: U16,
    file_size: u32,
}

#[repr(C)]
#[derive(Debug, Clone, FromBytes, IntoBytes, KnownLayout, Immutable)]
struct RawLfnEntry {
    ordinal: u8,
    name1: [U16; 5],
    attr: u8,
    entry_type: u8,
    checksum: u8,
    name2: [U16; 6],
    first_cluster_lo: U16,
    name3: [U16; 2],
}

/// A classified 32-byte directory slot.
pub enum Slot {
    Empty,
    Deleted,
    VolumeLabel,
    LongNameFragment(Vec<u16>),
    Short(ShortEntry),
}

#[derive(Debug, Clone)]
pub struct ShortEntry {
    pub short_name: String,
    pub attr: AttrSet,
    pub first_cluster: u32,
    pub file_size: u32,
    pub created: Timestamp,
    pub modified: Timestamp,
    pub accessed: Timestamp,
}

impl ShortEntry {
    pub fn is_directory(&self) -> bool {
        self.attr.is_directory()
    }
}

pub fn classify(bytes: &[u8; 32]) -> Slot {
    match bytes[0] {
        0x00 => return Slot::Empty,
        0xE5 => return Slot::Deleted,
        _ => {}
    }

    let attr = bytes[11];
    if attr == ATTR_LONG_NAME {
        let raw = RawLfnEntry::read_from_bytes(bytes.as_slice())
            .expect("32-byte slot always parses as RawLfnEntry");
        return Slot::LongNameFragment(decode_lfn_chars(&raw));
    }

    if attr & 0x08 != 0 {
        return Slot::VolumeLabel;
    }

    let raw = RawShortEntry::read_from_bytes(bytes.as_slice())
        .expect("32-byte slot always parses as RawShortEntry");
    Slot::Short(decode_short(&raw))
}

fn decode_lfn_chars(raw: &RawLfnEntry) -> Vec<u16> {
    let mut chars = Vec::with_capacity(13);
    for unit in raw
        .name1
        .iter()
        .chain(raw.name2.iter())
        .chain(raw.name3.iter())
    {
        let u = unit.get();
        if u == 0xFFFF {
            break;
        }
        chars.push(u);
    }
    while chars.last() == Some(&0x0000) {
        chars.pop();
    }
    chars
}

fn decode_short(raw: &RawShortEntry) -> ShortEntry {
    let short_name = format_short_name(&raw.name, &raw.ext);
    let attr = AttrSet::from_bits_truncate(raw.attr as u16);

    // The creation timestamp's sub-second bits are read verbatim into
    // nanoseconds rather than scaled to tenths of a second: a deliberate
    // deviation from the FAT spec's real encoding, matched for consistency
    // with the tool this crate replaces.
    let create24 = raw.create_time_tenth as u32 | (raw.create_time.get() as u32) << 8;
    let create_h = (create24 >> 19) & 0x1F;
    let create_m = (create24 >> 13) & 0x3F;
    let create_s = (create24 >> 7) & 0x3F;
    let create_ms = create24 & 0x7F;
    let created = dos_datetime(raw.create_date.get(), create_h, create_m, create_s, create_ms);

    let (wh, wm, ws) = dos_time(raw.write_time.get());
    let modified = dos_datetime(raw.write_date.get(), wh, wm, ws, 0);

    // Last-accessed carries a date only; FAT32 has no time-of-day for it.
    let accessed = dos_datetime(raw.last_access_date.get(), 0, 0, 0, 0);

    let first_cluster = (raw.first_cluster_hi.get() as u32) << 16 | raw.first_cluster_lo.get() as u32;

    ShortEntry {
        short_name,
        attr,
        first_cluster,
        file_size: raw.file_size,
        created,
        modified,
        accessed,
    }
}

fn dos_time(t: u16) -> (u32, u32, u32) {
    let h = (t >> 11) & 0x1F;
    let m = (t >> 5) & 0x3F;
    let s = (t & 0x1F) * 2;
    (h as u32, m as u32, s as u32)
}

fn dos_datetime(date: u16, h: u32, m: u32, s: u32, ms: u32) -> Timestamp {
    let year = 1980 + ((date >> 9) & 0x7F) as i32;
    let month = ((date >> 5) & 0x0F).max(1) as u32;
    let day = (date & 0x1F).max(1) as u32;

    let epoch = || {
        NaiveDate::from_ymd_opt(1980, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    };
    let naive = NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|d| d.and_hms_micro_opt(h, m, s, ms))
        .unwrap_or_else(epoch);
    Timestamp::from_naive(naive)
}

fn format_short_name(name: &[u8; 8], ext: &[u8; 3]) -> String {
    let mut raw_name = *name;
    // 0x05 is a historical escape for a real leading 0xE5 byte.
    if raw_name[0] == 0x05 {
        raw_name[0] = 0xE5;
    }
    let base = String::from_utf8_lossy(&raw_name).trim_end().to_string();
    let ext = String::from_utf8_lossy(ext).trim_end().to_string();
    if ext.is_empty() {
        base
    } else {
        format!("{base}.{ext}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn short_slot(name: &str, ext: &str, attr: u8) -> [u8; 32] {
        let mut b = [0u8; 32];
        let name_bytes = name.as_bytes();
        b[..name_bytes.len().min(8)].copy_from_slice(&name_bytes[..name_bytes.len().min(8)]);
        for i in name_bytes.len()..8 {
            b[i] = b' ';
        }
        let ext_bytes = ext.as_bytes();
        b[8..8 + ext_bytes.len().min(3)].copy_from_slice(&ext_bytes[..ext_bytes.len().min(3)]);
        for i in (8 + ext_bytes.len())..11 {
            b[i] = b' ';
        }
        b[11] = attr;
        b[26..28].copy_from_slice(&2u16.to_le_bytes());
        b
    }

    #[test]
    fn classifies_empty_and_deleted_slots() {
        let mut b = [0u8; 32];
        assert!(matches!(classify(&b), Slot::Empty));
        b[0] = 0xE5;
        assert!(matches!(classify(&b), Slot::Deleted));
    }

    #[test]
    fn decodes_short_name_with_trimmed_padding() {
        let b = short_slot("README", "TXT", 0x20);
        match classify(&b) {
            Slot::Short(e) => {
                assert_eq!(e.short_name, "README.TXT");
                assert_eq!(e.first_cluster, 2);
            }
            _ => panic!("expected short entry"),
        }
    }

    #[test]
    fn directory_attribute_is_detected() {
        let b = short_slot("SUBDIR", "", 0x10);
        match classify(&b) {
            Slot::Short(e) => assert!(e.is_directory()),
            _ => panic!("expected short entry"),
        }
    }

    #[test]
    fn lfn_fragment_truncates_at_terminator_and_trims_padding() {
        let mut b = [0u8; 32];
        b[0] = 0x41;
        b[11] = ATTR_LONG_NAME;
        let name: Vec<u16> = "hi".encode_utf16().collect();
        b[1..3].copy_from_slice(&name[0].to_le_bytes());
        b[3..5].copy_from_slice(&name[1].to_le_bytes());
        b[5..7].copy_from_slice(&0xFFFFu16.to_le_bytes());
        match classify(&b) {
            Slot::LongNameFragment(chars) => assert_eq!(chars, name),
            _ => panic!("expected LFN fragment"),
        }
    }
}
