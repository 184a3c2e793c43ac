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

const END_OF_CHAIN_MIN: u32 = 0x0FFF_FFF8;
const BAD_CLUSTER: u32 = 0x0FFF_FFF7;

/// The decoded 32-bit FAT: `entries[n]` is the value stored for cluster `n`.
pub struct FatTable {
    entries: Vec<u32>,
}

impl FatTable {
    pub fn parse(bytes: &[u8]) -> Self {
        let entries = bytes
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]) & 0x0FFF_FFFF)
            .collect();
        Self { entries }
    }

    /// Walks the chain starting at `start`, yielding each visited cluster in
    /// order. Stops before the first end-of-chain or bad-cluster marker.
    /// Bounded by `cluster_count` so a corrupt FAT cannot loop forever.
    pub fn chain_from(&self, start: u32, cluster_count: u32) -> FatChain<'_> {
        FatChain {
            table: self,
            current: Some(start),
            steps: 0,
            cap: cluster_count as usize + 2,
        }
    }
}

pub struct FatChain<'a> {
    table: &'a FatTable,
    current: Option<u32>,
    steps: usize,
    cap: usize,
}

impl<'a> Iterator for FatChain<'a> {
    type Item = Result<u32>;

    fn next(&mut self) -> Option<Self::Item> {
        let cur = self.current?;

        if self.steps >= self.cap {
            self.current = None;
            return Some(Err(Error::CorruptChain("chain longer than the volume's cluster count")));
        }
        self.steps += 1;

        if cur < 2 {
            self.current = None;
            return Some(Err(Error::CorruptChain("free or reserved cluster encountered mid-chain")));
        }

        let next = match self.table.entries.get(cur as usize) {
            Some(&v) => v,
            None => {
                self.current = None;
                return Some(Err(Error::CorruptChain("cluster index past the end of the FAT")));
            }
        };

        self.current = if next >= END_OF_CHAIN_MIN || next == BAD_CLUSTER {
            None
        } else {
            Some(next)
        };

        Some(Ok(cur))
    }
}
