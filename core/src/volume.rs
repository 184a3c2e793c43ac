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

use blockfs_err::Result;

use crate::entry::DirListing;

/// The uniform contract the interactive shell drives, implemented once per
/// backend (`blockfs_fat32::Fat32Volume`, `blockfs_ntfs::NtfsVolume`) and
/// dispatched over by `blockfs_volume::Volume`.
pub trait Volume {
    /// Lists a directory. An empty path means the current directory.
    fn list(&self, path: &str) -> Result<DirListing>;

    /// Changes the current directory. Fails if the target is not a
    /// directory; updates the cwd stack on success.
    fn change_dir(&self, path: &str) -> Result<()>;

    /// The current working directory, e.g. `"C:\Users\alice"`.
    fn cwd(&self) -> String;

    /// Reads a whole file's contents.
    fn read_file(&self, path: &str) -> Result<Vec<u8>>;

    /// Like `read_file`, but decodes the bytes as UTF-8.
    fn read_text_file(&self, path: &str) -> Result<String> {
        let bytes = self.read_file(path)?;
        String::from_utf8(bytes).map_err(|_| blockfs_err::Error::NotText)
    }

    /// Multi-line human-readable summary of the volume (name, key
    /// boot-sector fields).
    fn describe(&self) -> String;
}
