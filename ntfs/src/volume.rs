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

use std::cell::RefCell;

use blockfs_core::{DirEntry, DirListing};
use blockfs_device::BlockDevice;
use blockfs_err::{Error, Result};

use crate::boot_sector::NtfsBootSector;
use crate::directory_tree::{DirectoryTree, NtfsNode, ROOT_ID};
use crate::mft_record::{apply_usa_fixup, parse_record, DataDescriptor};

struct CwdFrame {
    file_id: u64,
    components: Vec<String>,
}

/// A mounted NTFS volume. Reads the whole `$MFT` once at open time and
/// derives the directory tree from every `$FILE_NAME` attribute; a later
/// `list`/`read_file` call never touches the device again beyond the file's
/// own `$DATA` runs.
pub struct NtfsVolume {
    device: Box<dyn BlockDevice>,
    boot: NtfsBootSector,
    tree: DirectoryTree,
    /// The name the volume was opened under (e.g. `"C:"`). A path whose
    /// first segment matches this, case-insensitively, is anchored at root
    /// with that segment dropped rather than resolved relative to cwd.
    name: String,
    cwd: RefCell<CwdFrame>,
}

impl NtfsVolume {
    pub fn open(name: &str, device: Box<dyn BlockDevice>) -> Result<Self> {
        let mut boot_sector = vec![0u8; 512];
        device.read_at(0, &mut boot_sector)?;
        let boot = NtfsBootSector::parse(&boot_sector)?;

        let mft_bytes = read_mft_bytes(device.as_ref(), &boot)?;
        let record_size = boot.record_size as usize;
        if record_size == 0 {
            return Err(Error::CorruptBootSector("zero MFT record size"));
        }
        let record_count = mft_bytes.len() / record_size;

        let records = (0..record_count).filter_map(|i| {
            let start = i * record_size;
            let mut slab = mft_bytes[start..start + record_size].to_vec();
            apply_usa_fixup(&mut slab);
            parse_record(&slab).map(|r| (i as u64, r))
        });
        let tree = DirectoryTree::build(records);

        Ok(Self {
            device,
            boot,
            tree,
            name: name.to_string(),
            cwd: RefCell::new(CwdFrame { file_id: ROOT_ID, components: Vec::new() }),
        })
    }

    fn read_data(&self, data: &DataDescriptor) -> Result<Vec<u8>> {
        match data {
            DataDescriptor::Resident(bytes) => Ok(bytes.clone()),
            DataDescriptor::NonResident { first_run_cluster, first_run_cluster_count, real_size } => {
                let run_bytes = first_run_cluster_count * self.boot.bytes_per_cluster();
                if *real_size > run_bytes {
                    return Err(Error::UnsupportedLayout(
                        "non-resident $DATA spans more than one cluster run",
                    ));
                }
                let lcn = first_run_cluster
                    .ok_or(Error::UnsupportedLayout("non-resident $DATA's first run is sparse"))?;
                let mut buf = vec![0u8; run_bytes as usize];
                self.device.read_at(self.boot.cluster_offset(lcn), &mut buf)?;
                buf.truncate((*real_size).min(run_bytes) as usize);
                Ok(buf)
            }
        }
    }

    fn walk(&self, path: &str, from: u64, from_components: &[String]) -> Result<(u64, Vec<String>)> {
        let mut id = from;
        let mut components = from_components.to_vec();

        let mut segments = split_components(path).into_iter().peekable();
        if !self.name.is_empty() {
            if let Some(first) = segments.peek() {
                if first.eq_ignore_ascii_case(&self.name) {
                    id = ROOT_ID;
                    components.clear();
                    segments.next();
                }
            }
        }

        for comp in segments {
            match comp {
                "." => continue,
                ".." => {
                    if !components.is_empty() {
                        let node = self.tree.get(id).ok_or_else(|| Error::NotFound("..".to_string()))?;
                        id = node.parent_id;
                        components.pop();
                    }
                }
                name => {
                    let child = self
                        .tree
                        .find_child(id, name)
                        .ok_or_else(|| Error::NotFound(name.to_string()))?;
                    if !child.is_directory {
                        return Err(Error::NotADirectory(name.to_string()));
                    }
                    id = child.file_id;
                    components.push(child.name.clone());
                }
            }
        }

        Ok((id, components))
    }

    fn resolve_dir(&self, path: &str) -> Result<(u64, Vec<String>)> {
        let absolute = path.starts_with(['\\', '/']);
        let cwd = self.cwd.borrow();
        if absolute {
            self.walk(path, ROOT_ID, &[])
        } else {
            self.walk(path, cwd.file_id, &cwd.components)
        }
    }

    fn resolve_file(&self, path: &str) -> Result<&NtfsNode> {
        let (parent, name) = split_parent_and_name(path);
        if name.is_empty() {
            return Err(Error::IsADirectory(path.to_string()));
        }
        let (dir_id, _) = self.resolve_dir(parent)?;
        let node = self
            .tree
            .find_child(dir_id, name)
            .ok_or_else(|| Error::NotFound(name.to_string()))?;
        if node.is_directory {
            return Err(Error::IsADirectory(name.to_string()));
        }
        Ok(node)
    }
}

impl blockfs_core::Volume for NtfsVolume {
    fn list(&self, path: &str) -> Result<DirListing> {
        let (dir_id, _) = self.resolve_dir(path)?;
        let entries = self
            .tree
            .children_of(dir_id)
            .map(|n| DirEntry {
                name: n.name.clone(),
                flags: n.attrs,
                size: n.size(),
                modified: n.modified,
                locator: n.file_id,
            })
            .collect();
        Ok(DirListing(entries))
    }

    fn change_dir(&self, path: &str) -> Result<()> {
        let (file_id, components) = self.resolve_dir(path)?;
        *self.cwd.borrow_mut() = CwdFrame { file_id, components };
        Ok(())
    }

    fn cwd(&self) -> String {
        let cwd = self.cwd.borrow();
        if cwd.components.is_empty() {
            r"\".to_string()
        } else {
            format!(r"\{}", cwd.components.join(r"\"))
        }
    }

    fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let node = self.resolve_file(path)?;
        match &node.data {
            Some(data) => self.read_data(data),
            None => Ok(Vec::new()),
        }
    }

    fn describe(&self) -> String {
        format!(
            "NTFS volume\n\
             OEM ID: NTFS\n\
             Serial Number: {:016X}\n\
             Bytes Per Sector: {}\n\
             Sectors Per Cluster: {}\n\
             Reserved Sectors: {}\n\
             No. Sectors In Volume: {}\n\
             First Cluster of $MFT: {}\n\
             First Cluster of $MFTMirr: {}\n\
             MFT record size: {}",
            self.boot.serial_number,
            self.boot.bytes_per_sector,
            self.boot.sectors_per_cluster,
            self.boot.reserved_sectors,
            self.boot.total_sectors,
            self.boot.mft_cluster,
            self.boot.mft_mirror_cluster,
            self.boot.record_size,
        )
    }
}

fn read_mft_bytes(device: &dyn BlockDevice, boot: &NtfsBootSector) -> Result<Vec<u8>> {
    let record_size = boot.record_size as usize;
    let mut record0 = vec![0u8; record_size];
    device.read_at(boot.cluster_offset(boot.mft_cluster), &mut record0)?;
    apply_usa_fixup(&mut record0);

    let record = parse_record(&record0).ok_or(Error::CorruptRecord("$MFT record 0 is not a FILE record"))?;
    match record.data {
        Some(DataDescriptor::Resident(bytes)) => Ok(bytes),
        Some(DataDescriptor::NonResident { first_run_cluster, first_run_cluster_count, real_size }) => {
            let run_bytes = first_run_cluster_count * boot.bytes_per_cluster();
            if real_size > run_bytes {
                return Err(Error::UnsupportedLayout("$MFT's own $DATA spans more than one cluster run"));
            }
            let lcn = first_run_cluster
                .ok_or(Error::UnsupportedLayout("$MFT's own $DATA's first run is sparse"))?;
            let mut buf = vec![0u8; run_bytes as usize];
            device.read_at(boot.cluster_offset(lcn), &mut buf)?;
            buf.truncate(real_size.min(run_bytes) as usize);
            Ok(buf)
        }
        None => Err(Error::CorruptRecord("$MFT record 0 has no $DATA attribute")),
    }
}

fn split_components(path: &str) -> Vec<&str> {
    path.split(['\\', '/']).filter(|c| !c.is_empty()).collect()
}

fn split_parent_and_name(path: &str) -> (&str, &str) {
    let trimmed = path.trim_end_matches(['\\', '/']);
    match trimmed.rfind(['\\', '/']) {
        Some(idx) => (&trimmed[..=idx], &trimmed[idx + 1..]),
        None => ("", trimmed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blockfs_core::Volume as _;
    use blockfs_device::MemoryBlockDevice;

    const BYTES_PER_SECTOR: u16 = 512;
    const SECTORS_PER_CLUSTER: u8 = 2; // bytes_per_cluster == RECORD_SIZE, one record per cluster
    const RECORD_SIZE: usize = 1024;
    const MFT_CLUSTER: u64 = 2;

    fn write_attr_header(rec: &mut [u8], pos: usize, attr_type: u32, length: u32, non_resident: bool) {
        rec[pos..pos + 4].copy_from_slice(&attr_type.to_le_bytes());
        rec[pos + 4..pos + 8].copy_from_slice(&length.to_le_bytes());
        rec[pos + 8] = non_resident as u8;
        rec[pos + 9] = 0; // name_length
    }

    fn write_resident_value(rec: &mut [u8], pos: usize, value: &[u8], header_len: usize) {
        let value_offset = 24u16;
        rec[pos + 16..pos + 20].copy_from_slice(&(value.len() as u32).to_le_bytes());
        rec[pos + 20..pos + 22].copy_from_slice(&value_offset.to_le_bytes());
        let value_pos = pos + value_offset as usize;
        rec[value_pos..value_pos + value.len()].copy_from_slice(value);
        let _ = header_len;
    }

    fn file_name_value(parent_id: u64, name: &str, namespace: u8) -> Vec<u8> {
        let mut v = vec![0u8; 66];
        v[0..8].copy_from_slice(&parent_id.to_le_bytes());
        let units: Vec<u16> = name.encode_utf16().collect();
        v[64] = units.len() as u8;
        v[65] = namespace;
        for u in &units {
            v.extend_from_slice(&u.to_le_bytes());
        }
        v
    }

    fn build_record(file_id: u64, parent_id: u64, name: &str, is_directory: bool, data: Option<&[u8]>) -> Vec<u8> {
        let mut rec = vec![0u8; RECORD_SIZE];
        rec[0..4].copy_from_slice(b"FILE");
        rec[4..6].copy_from_slice(&0u16.to_le_bytes()); // usa_offset unused (count 0)
        rec[6..8].copy_from_slice(&0u16.to_le_bytes());
        let flags: u16 = 0x0001 | if is_directory { 0x0002 } else { 0 };
        rec[20..22].copy_from_slice(&56u16.to_le_bytes()); // first_attr_offset
        rec[22..24].copy_from_slice(&flags.to_le_bytes());

        let mut pos = 56usize;

        let fn_value = file_name_value(parent_id, name, 0x01);
        let fn_attr_len = 24 + fn_value.len();
        let fn_attr_len = align8(fn_attr_len);
        write_attr_header(&mut rec, pos, 0x30, fn_attr_len as u32, false);
        write_resident_value(&mut rec, pos, &fn_value, 24);
        pos += fn_attr_len;

        if let Some(bytes) = data {
            let data_attr_len = align8(24 + bytes.len());
            write_attr_header(&mut rec, pos, 0x80, data_attr_len as u32, false);
            write_resident_value(&mut rec, pos, bytes, 24);
            pos += data_attr_len;
        }

        rec[pos..pos + 4].copy_from_slice(&0xFFFF_FFFFu32.to_le_bytes());
        rec[24..28].copy_from_slice(&((pos + 8) as u32).to_le_bytes()); // used_size
        rec
    }

    fn align8(n: usize) -> usize {
        (n + 7) & !7
    }

    /// Builds a record with a single-run non-resident `$DATA` attribute
    /// pointing at `data_cluster`, `run_clusters` clusters long, reporting
    /// `real_size` bytes (which may be smaller than the run, to exercise
    /// truncation).
    fn build_record_non_resident(
        file_id: u64,
        parent_id: u64,
        name: &str,
        data_cluster: u64,
        run_clusters: u64,
        real_size: u64,
    ) -> Vec<u8> {
        let mut rec = vec![0u8; RECORD_SIZE];
        rec[0..4].copy_from_slice(b"FILE");
        rec[20..22].copy_from_slice(&56u16.to_le_bytes());
        rec[22..24].copy_from_slice(&0x0001u16.to_le_bytes());

        let mut pos = 56usize;

        let fn_value = file_name_value(parent_id, name, 0x01);
        let fn_attr_len = align8(24 + fn_value.len());
        write_attr_header(&mut rec, pos, 0x30, fn_attr_len as u32, false);
        write_resident_value(&mut rec, pos, &fn_value, 24);
        pos += fn_attr_len;

        let data_run_offset = 64u16;
        let run_bytes = run_clusters * RECORD_SIZE as u64; // bytes_per_cluster == RECORD_SIZE
        rec[pos..pos + 4].copy_from_slice(&0x80u32.to_le_bytes());
        rec[pos + 8] = 1;
        rec[pos + 32..pos + 34].copy_from_slice(&data_run_offset.to_le_bytes());
        rec[pos + 40..pos + 48].copy_from_slice(&run_bytes.to_le_bytes());
        rec[pos + 48..pos + 56].copy_from_slice(&real_size.to_le_bytes());
        rec[pos + 56..pos + 64].copy_from_slice(&real_size.to_le_bytes());

        let mut runs = vec![0x31u8];
        runs.push(run_clusters as u8);
        runs.extend_from_slice(&(data_cluster as i64).to_le_bytes()[..3]);
        runs.push(0);
        let run_pos = pos + data_run_offset as usize;
        rec[run_pos..run_pos + runs.len()].copy_from_slice(&runs);

        let attr_len = align8(run_pos + runs.len() - pos);
        rec[pos + 4..pos + 8].copy_from_slice(&(attr_len as u32).to_le_bytes());
        pos += attr_len;

        rec[pos..pos + 4].copy_from_slice(&0xFFFF_FFFFu32.to_le_bytes());
        rec[24..28].copy_from_slice(&((pos + 8) as u32).to_le_bytes());
        rec
    }

    /// Builds a synthetic $MFT of 8 contiguous one-cluster records: record 0
    /// is `$MFT` itself (a single run covering the whole extent, inclusive of
    /// itself, the way a real volume lays it out), records 1-4 are unused,
    /// and 5/6/7 are the root directory, a `Docs` subdirectory, and a
    /// resident file inside it.
    fn synthetic_volume() -> NtfsVolume {
        let bytes_per_cluster = BYTES_PER_SECTOR as usize * SECTORS_PER_CLUSTER as usize;
        assert_eq!(bytes_per_cluster, RECORD_SIZE);
        let mft_offset = MFT_CLUSTER as usize * bytes_per_cluster;
        let total_records = 9usize;
        let mft_extent_len = total_records * RECORD_SIZE;
        // one extra cluster right after the $MFT extent holds BIG.BIN's data.
        let data_cluster = MFT_CLUSTER + total_records as u64;
        let image_len = mft_offset + mft_extent_len + bytes_per_cluster;

        let mut image = vec![0u8; image_len];

        image[3..11].copy_from_slice(b"NTFS    ");
        image[11..13].copy_from_slice(&BYTES_PER_SECTOR.to_le_bytes());
        image[13] = SECTORS_PER_CLUSTER;
        image[0x0E..0x10].copy_from_slice(&8u16.to_le_bytes()); // reserved sectors
        image[0x28..0x30].copy_from_slice(&(image_len as u64 / BYTES_PER_SECTOR as u64).to_le_bytes());
        image[0x30..0x38].copy_from_slice(&MFT_CLUSTER.to_le_bytes());
        image[0x38..0x40].copy_from_slice(&(MFT_CLUSTER + 1).to_le_bytes());
        image[0x40] = (-10i8) as u8; // 1024-byte records
        image[0x48..0x50].copy_from_slice(&0xDEAD_BEEF_0000_0001u64.to_le_bytes());
        image[510..512].copy_from_slice(&[0x55, 0xAA]);

        let data_off = data_cluster as usize * bytes_per_cluster;
        let content = b"forensic triage payload";
        image[data_off..data_off + content.len()].copy_from_slice(content);

        let mft_record0 = build_mft_self_record(total_records as u64);
        let root = build_record(5, 5, ".", true, None);
        let docs = build_record(6, 5, "Docs", true, None);
        let readme = build_record(7, 6, "README.TXT", false, Some(b"hello"));
        let big = build_record_non_resident(8, 5, "BIG.BIN", data_cluster, 1, content.len() as u64);

        let records = [
            mft_record0,
            vec![0u8; RECORD_SIZE],
            vec![0u8; RECORD_SIZE],
            vec![0u8; RECORD_SIZE],
            vec![0u8; RECORD_SIZE],
            root,
            docs,
            readme,
            big,
        ];
        for (i, r) in records.iter().enumerate() {
            let off = mft_offset + i * RECORD_SIZE;
            image[off..off + RECORD_SIZE].copy_from_slice(r);
        }

        NtfsVolume::open("C:", Box::new(MemoryBlockDevice::new(image))).unwrap()
    }

    fn build_mft_self_record(total_records: u64) -> Vec<u8> {
        let mut rec = vec![0u8; RECORD_SIZE];
        rec[0..4].copy_from_slice(b"FILE");
        rec[20..22].copy_from_slice(&56u16.to_le_bytes()); // first_attr_offset
        rec[22..24].copy_from_slice(&0x0001u16.to_le_bytes()); // in use, not a directory

        let pos = 56usize;
        let data_run_offset = 64u16;
        let mft_bytes = total_records * RECORD_SIZE as u64;

        rec[pos..pos + 4].copy_from_slice(&0x80u32.to_le_bytes()); // type $DATA
        rec[pos + 8] = 1; // non-resident
        rec[pos + 32..pos + 34].copy_from_slice(&data_run_offset.to_le_bytes());
        rec[pos + 40..pos + 48].copy_from_slice(&mft_bytes.to_le_bytes()); // allocated_size
        rec[pos + 48..pos + 56].copy_from_slice(&mft_bytes.to_le_bytes()); // real_size
        rec[pos + 56..pos + 64].copy_from_slice(&mft_bytes.to_le_bytes()); // initialized_size

        // one run: `total_records` clusters starting at cluster MFT_CLUSTER,
        // i.e. the $MFT's own location (it describes itself).
        let mut runs = vec![0x31u8]; // length_size=1 byte, offset_size=3 bytes
        runs.push(total_records as u8);
        runs.extend_from_slice(&(MFT_CLUSTER as i64).to_le_bytes()[..3]);
        runs.push(0); // terminator
        let run_pos = pos + data_run_offset as usize;
        rec[run_pos..run_pos + runs.len()].copy_from_slice(&runs);

        let attr_len = align8(run_pos + runs.len() - pos);
        rec[pos + 4..pos + 8].copy_from_slice(&(attr_len as u32).to_le_bytes());

        let end_pos = pos + attr_len;
        rec[end_pos..end_pos + 4].copy_from_slice(&0xFFFF_FFFFu32.to_le_bytes());
        rec[24..28].copy_from_slice(&((end_pos + 8) as u32).to_le_bytes()); // used_size
        rec
    }

    #[test]
    fn lists_root_directory() {
        let vol = synthetic_volume();
        let listing = vol.list("").unwrap();
        let names: Vec<_> = listing.entries().iter().map(|e| e.name.clone()).collect();
        assert!(names.contains(&"Docs".to_string()));
    }

    #[test]
    fn reads_nested_resident_file() {
        let vol = synthetic_volume();
        assert_eq!(vol.read_file(r"Docs\README.TXT").unwrap(), b"hello");
    }

    #[test]
    fn reads_non_resident_file_truncated_to_real_size() {
        let vol = synthetic_volume();
        assert_eq!(vol.read_file("BIG.BIN").unwrap(), b"forensic triage payload");
    }

    #[test]
    fn leading_volume_name_segment_is_dropped_and_anchors_at_root() {
        let vol = synthetic_volume();
        vol.change_dir("Docs").unwrap();
        // even though cwd is now \Docs, a path starting with the volume's
        // own name restarts at root instead of resolving relative to cwd.
        assert_eq!(vol.read_file(r"C:\Docs\README.TXT").unwrap(), b"hello");
    }

    #[test]
    fn describe_reports_the_important_info_fields() {
        let vol = synthetic_volume();
        let text = vol.describe();
        assert!(text.contains("Serial Number: DEADBEEF00000001"));
        assert!(text.contains("Bytes Per Sector: 512"));
        assert!(text.contains(&format!("First Cluster of $MFT: {MFT_CLUSTER}")));
        assert!(text.contains(&format!("First Cluster of $MFTMirr: {}", MFT_CLUSTER + 1)));
        assert!(text.contains("MFT record size: 1024"));
    }

    #[test]
    fn change_dir_updates_cwd() {
        let vol = synthetic_volume();
        vol.change_dir("Docs").unwrap();
        assert_eq!(vol.cwd(), r"\Docs");
        assert_eq!(vol.read_file("README.TXT").unwrap(), b"hello");
    }
}
