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

use std::collections::HashMap;

use blockfs_core::{AttrSet, Timestamp};

use crate::mft_record::{DataDescriptor, FileRecord};

/// The well-known file ID of the volume root directory. Its own `$FILE_NAME`
/// parent reference points back at itself.
pub const ROOT_ID: u64 = 5;

#[derive(Debug, Clone)]
pub struct NtfsNode {
    pub file_id: u64,
    pub parent_id: u64,
    pub name: String,
    pub is_directory: bool,
    pub modified: Timestamp,
    /// `$STANDARD_INFORMATION`'s DOS-style flags, plus `AttrSet::DIRECTORY`
    /// when the record header marked this a directory.
    pub attrs: AttrSet,
    pub data: Option<DataDescriptor>,
}

impl NtfsNode {
    pub fn size(&self) -> u64 {
        match &self.data {
            Some(DataDescriptor::Resident(bytes)) => bytes.len() as u64,
            Some(DataDescriptor::NonResident { real_size, .. }) => *real_size,
            None => 0,
        }
    }
}

/// The parent/child structure of a volume, built once from every in-use
/// `$FILE_NAME` attribute in the MFT rather than by walking each directory's
/// own `$INDEX_ROOT`/`$INDEX_ALLOCATION` B-tree.
pub struct DirectoryTree {
    nodes: HashMap<u64, NtfsNode>,
}

impl DirectoryTree {
    pub fn build(records: impl Iterator<Item = (u64, FileRecord)>) -> Self {
        let mut nodes = HashMap::new();
        for (file_id, record) in records {
            if !record.in_use {
                continue;
            }
            let (Some(name), Some(parent_id)) = (record.name, record.parent_id) else {
                continue;
            };
            let modified = record.modified.unwrap_or_else(crate::mft_record::filetime_epoch);
            let attrs = if record.is_directory {
                record.attrs | AttrSet::DIRECTORY
            } else {
                record.attrs
            };
            nodes.insert(
                file_id,
                NtfsNode {
                    file_id,
                    parent_id,
                    name,
                    is_directory: record.is_directory,
                    modified,
                    attrs,
                    data: record.data,
                },
            );
        }
        Self { nodes }
    }

    pub fn get(&self, id: u64) -> Option<&NtfsNode> {
        self.nodes.get(&id)
    }

    pub fn children_of(&self, id: u64) -> impl Iterator<Item = &NtfsNode> {
        self.nodes.values().filter(move |n| n.parent_id == id && n.file_id != id)
    }

    pub fn find_child(&self, parent_id: u64, name: &str) -> Option<&NtfsNode> {
        self.children_of(parent_id).find(|n| n.name.eq_ignore_ascii_case(name))
    }
}
