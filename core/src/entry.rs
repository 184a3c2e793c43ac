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

use crate::{attr::AttrSet, timestamp::Timestamp};

/// One row of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub flags: AttrSet,
    pub size: u64,
    pub modified: Timestamp,
    /// An advisory on-disk sector used by `ls`; never required for
    /// correctness, so callers must not rely on it to read the entry back.
    pub locator: u64,
}

impl DirEntry {
    pub fn is_directory(&self) -> bool {
        self.flags.is_directory()
    }
}

/// An ordered directory listing, as returned by `Volume::list`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirListing(pub Vec<DirEntry>);

impl DirListing {
    pub fn entries(&self) -> &[DirEntry] {
        &self.0
    }
}

impl IntoIterator for DirListing {
    type Item = DirEntry;
    type IntoIter = std::vec::IntoIter<DirEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
