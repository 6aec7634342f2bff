// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Port of RISCV_MEMORY_BARRIER() from esp_amp_queue.c — a full fence around
// every publish/observe of a shared descriptor's flag word. Both cores are
// assumed to address the shared region coherently; the fence, not a cache
// flush, is what makes the flag-flip protocol safe without a shared-memory
// compare-and-swap.

use std::sync::atomic::{fence, Ordering};

/// Full fence. Call after writing the payload a flag flip is about to
/// publish, and after reading a flag before trusting the payload it guards.
#[inline(always)]
pub fn full_fence() {
    fence(Ordering::SeqCst);
}
