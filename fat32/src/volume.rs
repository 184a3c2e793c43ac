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
use std::collections::HashMap;
use std::rc::Rc;

use blockfs_core::{DirEntry, DirListing};
use blockfs_device::BlockDevice;
use blockfs_err::{Error, Result};

use crate::boot_sector::Fat32BootSector;
use crate::directory::FatDirectory;
use crate::fat_table::FatTable;

struct CwdFrame {
    cluster: u32,
    components: Vec<String>,
}

struct Walked {
    cluster: u32,
    components: Vec<String>,
}

/// A mounted FAT32 volume. `!Sync` by construction (its caches use `RefCell`),
/// matching the single-threaded, cooperative shell this crate serves.
pub struct Fat32Volume {
    device: Box<dyn BlockDevice>,
    boot: Fat32BootSector,
    fat: FatTable,
    cwd: RefCell<CwdFrame>,
    dir_cache: RefCell<HashMap<u32, Rc<FatDirectory>>>,
}

impl Fat32Volume {
    pub fn open(device: Box<dyn BlockDevice>) -> Result<Self> {
        let mut boot_sector = vec![0u8; 512];
        device.read_at(0, &mut boot_sector)?;
        let boot = Fat32BootSector::parse(&boot_sector)?;

        let fat_len = boot.fat_count as u64 * boot.sectors_per_fat as u64 * boot.bytes_per_sector as u64;
        let mut fat_bytes = vec![0u8; fat_len as usize];
        device.read_at(boot.fat_region_offset(), &mut fat_bytes)?;
        let fat = FatTable::parse(&fat_bytes);

        let root_cluster = boot.root_cluster;
        Ok(Self {
            device,
            boot,
            fat,
            cwd: RefCell::new(CwdFrame { cluster: root_cluster, components: Vec::new() }),
            dir_cache: RefCell::new(HashMap::new()),
        })
    }

    fn resolve_cluster(&self, cluster: u32) -> u32 {
        if cluster == 0 { self.boot.root_cluster } else { cluster }
    }

    fn read_cluster_chain(&self, start: u32) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        for cluster in self.fat.chain_from(start, self.boot.cluster_count()) {
            let cluster = cluster?;
            let offset = self.boot.cluster_offset(cluster);
            let mut cluster_buf = vec![0u8; self.boot.bytes_per_cluster() as usize];
            self.device.read_at(offset, &mut cluster_buf)?;
            buf.extend_from_slice(&cluster_buf);
        }
        Ok(buf)
    }

    fn read_directory(&self, cluster: u32) -> Result<Rc<FatDirectory>> {
        if let Some(dir) = self.dir_cache.borrow().get(&cluster) {
            return Ok(Rc::clone(dir));
        }
        let bytes = self.read_cluster_chain(cluster)?;
        let dir = Rc::new(FatDirectory::parse(&bytes));
        self.dir_cache.borrow_mut().insert(cluster, Rc::clone(&dir));
        Ok(dir)
    }

    fn walk_dirs(&self, path: &str) -> Result<Walked> {
        let absolute = path.starts_with(['\\', '/']);
        let (mut cluster, mut components) = if absolute {
            (self.boot.root_cluster, Vec::new())
        } else {
            let cwd = self.cwd.borrow();
            (cwd.cluster, cwd.components.clone())
        };

        for comp in split_components(path) {
            match comp {
                "." => continue,
                ".." => {
                    if !components.is_empty() {
                        let dir = self.read_directory(cluster)?;
                        let parent = dir.find("..").ok_or_else(|| Error::NotFound("..".to_string()))?;
                        cluster = self.resolve_cluster(parent.short.first_cluster);
                        components.pop();
                    }
                }
                name => {
                    let dir = self.read_directory(cluster)?;
                    let entry = dir.find(name).ok_or_else(|| Error::NotFound(name.to_string()))?;
                    if !entry.short.is_directory() {
                        return Err(Error::NotADirectory(name.to_string()));
                    }
                    cluster = self.resolve_cluster(entry.short.first_cluster);
                    components.push(entry.display_name().to_string());
                }
            }
        }

        Ok(Walked { cluster, components })
    }

    fn resolve_file(&self, path: &str) -> Result<(u32, u32)> {
        let (parent, name) = split_parent_and_name(path);
        if name.is_empty() {
            return Err(Error::IsADirectory(path.to_string()));
        }
        let walked = self.walk_dirs(parent)?;
        let dir = self.read_directory(walked.cluster)?;
        let entry = dir.find(name).ok_or_else(|| Error::NotFound(name.to_string()))?;
        if entry.short.is_directory() {
            return Err(Error::IsADirectory(name.to_string()));
        }
        Ok((entry.short.first_cluster, entry.short.file_size))
    }
}

impl blockfs_core::Volume for Fat32Volume {
    fn list(&self, path: &str) -> Result<DirListing> {
        let walked = self.walk_dirs(path)?;
        let dir = self.read_directory(walked.cluster)?;
        let entries = dir
            .active_entries()
            .map(|e| DirEntry {
                name: e.display_name().to_string(),
                flags: e.short.attr,
                size: e.short.file_size as u64,
                modified: e.short.modified,
                locator: self.boot.cluster_offset(e.short.first_cluster),
            })
            .collect();
        Ok(DirListing(entries))
    }

    fn change_dir(&self, path: &str) -> Result<()> {
        let walked = self.walk_dirs(path)?;
        *self.cwd.borrow_mut() = CwdFrame { cluster: walked.cluster, components: walked.components };
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
        let (first_cluster, size) = self.resolve_file(path)?;
        if size == 0 {
            return Ok(Vec::new());
        }
        let mut bytes = self.read_cluster_chain(first_cluster)?;
        bytes.truncate(size as usize);
        Ok(bytes)
    }

    fn describe(&self) -> String {
        format!(
            "FAT32 volume\n\
             Bytes Per Sector: {}\n\
             Sectors Per Cluster: {}\n\
             Reserved Sectors: {}\n\
             Sectors Per FAT: {}\n\
             No. Copies of FAT: {}\n\
             No. Sectors In Volume: {}\n\
             Starting Cluster of RDET: {}\n\
             Starting Sector of Data: {}\n\
             FAT Name: {}",
            self.boot.bytes_per_sector,
            self.boot.sectors_per_cluster,
            self.boot.reserved_sectors,
            self.boot.sectors_per_fat,
            self.boot.fat_count,
            self.boot.sectors_in_volume,
            self.boot.root_cluster,
            self.boot.data_region_sector(),
            self.boot.fs_type_label,
        )
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
