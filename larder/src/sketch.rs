//  Copyright 2025 Larder Project Authors
//
//  Licensed under the Apache License, Version 2.0 (the "License");
//  you may not use this file except in compliance with the License.
//  You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0
//
//  Unless required by applicable law or agreed to in writing, software
//  distributed under the License is distributed on an "AS IS" BASIS,
//  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//  See the License for the specific language governing permissions and
//  limitations under the License.

use larder_common::strict_assert;
use tracing::trace;

/// Count-min sketch of 4-bit saturating counters, two per byte.
///
/// Row `i` maps a hash to column `(hash + i) % width`; the estimate is the
/// minimum over rows. Once `reset_threshold` increments have been recorded
/// every counter is halved, so stale frequencies age out and the 15-cap is
/// never reached by long-lived keys alone.
pub struct CountMinSketch {
    cells: Vec<u8>,
    width: usize,
    depth: usize,
    row_stride: usize,
    total: usize,
    reset_threshold: usize,
}

impl CountMinSketch {
    pub fn new(width: usize, depth: usize, reset_threshold: usize) -> Self {
        strict_assert!(width > 0);
        strict_assert!(depth > 0);
        let row_stride = width.div_ceil(2);
        Self {
            cells: vec![0; row_stride * depth],
            width,
            depth,
            row_stride,
            total: 0,
            reset_threshold: reset_threshold.max(1),
        }
    }

    pub fn increment(&mut self, hash: u64) {
        for row in 0..self.depth {
            let (byte, shift) = self.locate(row, hash);
            let cell = (self.cells[byte] >> shift) & 0xf;
            if cell < 0xf {
                self.cells[byte] += 1 << shift;
            }
        }
        self.total += 1;
        if self.total >= self.reset_threshold {
            self.reset();
        }
    }

    pub fn estimate(&self, hash: u64) -> u8 {
        let mut min = u8::MAX;
        for row in 0..self.depth {
            let (byte, shift) = self.locate(row, hash);
            min = min.min((self.cells[byte] >> shift) & 0xf);
        }
        min
    }

    /// Ages the sketch by halving every counter.
    fn reset(&mut self) {
        trace!(total = self.total, "aging frequency sketch");
        for byte in self.cells.iter_mut() {
            *byte = (*byte >> 1) & 0x77;
        }
        self.total /= 2;
    }

    fn locate(&self, row: usize, hash: u64) -> (usize, u8) {
        let col = (hash.wrapping_add(row as u64) % self.width as u64) as usize;
        (row * self.row_stride + col / 2, (col as u8 & 1) * 4)
    }
}
