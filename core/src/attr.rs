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

use bitflags::bitflags;

bitflags! {
    /// DOS attribute byte conventions for the first six bits, extended with
    /// NTFS-only flags, so both backends share one presentation type.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct AttrSet: u16 {
        const READ_ONLY    = 0x0001;
        const HIDDEN       = 0x0002;
        const SYSTEM       = 0x0004;
        const VOLUME_LABEL = 0x0008;
        const DIRECTORY    = 0x0010;
        const ARCHIVE      = 0x0020;

        const DEVICE       = 0x0040;
        const NORMAL       = 0x0080;
        const TEMPORARY    = 0x0100;
        const SPARSE       = 0x0200;
        const REPARSE      = 0x0400;
        const COMPRESSED   = 0x0800;
        const OFFLINE      = 0x1000;
        const NOT_INDEXED  = 0x2000;
        const ENCRYPTED    = 0x4000;
    }
}

impl AttrSet {
    pub fn is_directory(self) -> bool {
        self.contains(AttrSet::DIRECTORY)
    }
}
