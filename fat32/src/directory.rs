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

use crate::dir_entry::{classify, ShortEntry, Slot};

/// A short entry paired with its reassembled long name, if any.
#[derive(Debug, Clone)]
pub struct FatDirEntry {
    pub short: ShortEntry,
    pub long_name: Option<String>,
}

impl FatDirEntry {
    pub fn display_name(&self) -> &str {
        self.long_name.as_deref().unwrap_or(&self.short.short_name)
    }

    /// An entry shown by `ls`: not free, not deleted, not a volume label,
    /// and not flagged SYSTEM.
    pub fn is_active(&self) -> bool {
        !self.short.attr.contains(blockfs_core::AttrSet::SYSTEM)
    }
}

/// The decoded contents of one directory: every short entry found, each
/// carrying whatever long name preceded it.
pub struct FatDirectory {
    pub entries: Vec<FatDirEntry>,
}

impl FatDirectory {
    /// Parses a directory from the concatenated bytes of its cluster chain.
    ///
    /// Does not stop at the first unused (`0x00`) slot: it keeps scanning to
    /// the end of the cluster, so live entries sitting past a hole left by a
    /// prior deletion still surface.
    pub fn parse(bytes: &[u8]) -> Self {
        let mut entries = Vec::new();
        let mut pending_name: Vec<u16> = Vec::new();

        for chunk in bytes.chunks_exact(32) {
            let slot: &[u8; 32] = chunk.try_into().expect("chunks_exact(32) yields 32-byte slices");
            match classify(slot) {
                Slot::Empty | Slot::Deleted | Slot::VolumeLabel => pending_name.clear(),
                Slot::LongNameFragment(mut chars) => {
                    // Fragments precede the short entry they belong to in
                    // descending ordinal order, so each new fragment's text
                    // goes in front of what has been collected so far.
                    chars.extend_from_slice(&pending_name);
                    pending_name = chars;
                }
                Slot::Short(short) => {
                    let long_name = if pending_name.is_empty() {
                        None
                    } else {
                        Some(String::from_utf16_lossy(&pending_name))
                    };
                    pending_name = Vec::new();
                    entries.push(FatDirEntry { short, long_name });
                }
            }
        }

        Self { entries }
    }

    /// Case-insensitive lookup of a component name against every stored
    /// entry (active or not: `ls` hides SYSTEM entries, but `cd`/`cat` can
    /// still reach them).
    pub fn find(&self, name: &str) -> Option<&FatDirEntry> {
        self.entries
            .iter()
            .find(|e| e.display_name().eq_ignore_ascii_case(name))
    }

    pub fn active_entries(&self) -> impl Iterator<Item = &FatDirEntry> {
        self.entries.iter().filter(|e| e.is_active())
    }
}
