// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Port of esp_amp_sw_intr.c — a cross-core software interrupt with
// coalescing semantics. `trigger` ORs a bit into the peer's pending-bits
// word and raises a hardware line (out of scope: abstracted as a
// [`HwSignalLine`]); `on_hw_interrupt` drains the local word and dispatches
// to registered handlers, re-looping while new bits arrive during dispatch.

use std::sync::atomic::{AtomicU32, Ordering};

use crate::sync::CriticalSection;
use crate::{AmpError, AmpResult};

/// Reserved logical interrupt ids. `VqueueRecv` is the one the message bus
/// registers its RX drain on; 0..3 are free for other uses of the signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SwIntrId {
    Id0 = 0,
    Id1 = 1,
    Id2 = 2,
    Id3 = 3,
    VqueueRecv = 4,
}

/// Which side of the signal this handle acts as. A device pair has one
/// signal per direction; each core's handle observes its own pending word
/// and triggers into its peer's.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalTarget {
    Main,
    Sub,
}

/// The cross-core software-interrupt peripheral: out of scope for this
/// crate, whose only contract is "raise the peer's hardware line". A host
/// build without real hardware can satisfy this by calling the peer's
/// `on_hw_interrupt` directly (see `ImmediateHwLine` in the bus tests).
pub trait HwSignalLine: Send + Sync {
    fn raise(&self);
}

/// Shared pending-bits state: one atomic word per direction. Lives in
/// shared memory in the real target; the raw pointer indirection here
/// models that without requiring an actual MMIO region on the host.
#[repr(C)]
pub struct PendingBits {
    pub main_pending_bits: AtomicU32,
    pub sub_pending_bits: AtomicU32,
}

impl PendingBits {
    pub const fn new() -> Self {
        Self {
            main_pending_bits: AtomicU32::new(0),
            sub_pending_bits: AtomicU32::new(0),
        }
    }
}

impl Default for PendingBits {
    fn default() -> Self {
        Self::new()
    }
}

const HANDLER_TABLE_LEN: usize = 8;

type HandlerFn = fn(u8, *mut ());

#[derive(Clone, Copy)]
struct HandlerSlot {
    intr_id: u8,
    handler: HandlerFn,
    arg: *mut (),
}

unsafe impl Send for HandlerSlot {}

/// One core's view of the cross-core signal: a pointer into the shared
/// pending-bits state, which side it is, the line it raises to notify its
/// peer, and a local (per-core, not shared) handler table.
///
/// Port of `esp_amp_sw_intr_add_handler` / `delete_handler` / `trigger` /
/// `esp_amp_sw_intr_handler` (the dispatcher run from `on_hw_interrupt`).
pub struct CrossCoreSignal<L: HwSignalLine> {
    bits: *const PendingBits,
    side: SignalTarget,
    hw_line: L,
    handlers: crate::sync::SpinCriticalSection,
    table: std::cell::UnsafeCell<[Option<HandlerSlot>; HANDLER_TABLE_LEN]>,
}

unsafe impl<L: HwSignalLine> Send for CrossCoreSignal<L> {}
unsafe impl<L: HwSignalLine> Sync for CrossCoreSignal<L> {}

impl<L: HwSignalLine> CrossCoreSignal<L> {
    /// # Safety
    /// `bits` must point at a `PendingBits` shared with the peer for the
    /// lifetime of this handle.
    pub unsafe fn new(bits: *const PendingBits, side: SignalTarget, hw_line: L) -> Self {
        Self {
            bits,
            side,
            hw_line,
            handlers: crate::sync::SpinCriticalSection::new(),
            table: std::cell::UnsafeCell::new([None; HANDLER_TABLE_LEN]),
        }
    }

    fn local_word(&self) -> &AtomicU32 {
        match self.side {
            SignalTarget::Main => unsafe { &(*self.bits).main_pending_bits },
            SignalTarget::Sub => unsafe { &(*self.bits).sub_pending_bits },
        }
    }

    fn peer_word(&self) -> &AtomicU32 {
        match self.side {
            SignalTarget::Main => unsafe { &(*self.bits).sub_pending_bits },
            SignalTarget::Sub => unsafe { &(*self.bits).main_pending_bits },
        }
    }

    /// OR `1 << intr_id` into the peer's pending bits and raise its line.
    pub fn trigger(&self, intr_id: u8) {
        self.peer_word().fetch_or(1u32 << intr_id, Ordering::AcqRel);
        crate::fence::full_fence();
        self.hw_line.raise();
    }

    /// Register a handler for `intr_id`. Fails with [`AmpError::NoMem`] if
    /// the table is full.
    pub fn add_handler(&self, intr_id: u8, handler: HandlerFn, arg: *mut ()) -> AmpResult<()> {
        self.handlers.enter();
        let table = unsafe { &mut *self.table.get() };
        let slot = table.iter_mut().find(|s| s.is_none());
        let result = match slot {
            Some(slot) => {
                *slot = Some(HandlerSlot { intr_id, handler, arg });
                Ok(())
            }
            None => Err(AmpError::NoMem),
        };
        self.handlers.leave();
        result
    }

    /// Remove the first handler matching both `intr_id` and `handler`.
    pub fn delete_handler(&self, intr_id: u8, handler: HandlerFn) {
        self.handlers.enter();
        let table = unsafe { &mut *self.table.get() };
        for slot in table.iter_mut() {
            if matches!(slot, Some(s) if s.intr_id == intr_id && s.handler == handler) {
                *slot = None;
                break;
            }
        }
        self.handlers.leave();
    }

    /// Drain the local pending-bits word and dispatch to every matching
    /// handler, re-looping while new bits were OR'd in during dispatch.
    /// Invariant: returns only once the pending word reads 0.
    pub fn on_hw_interrupt(&self) {
        loop {
            let snapshot = self.local_word().swap(0, Ordering::AcqRel);
            if snapshot == 0 {
                return;
            }
            crate::fence::full_fence();
            self.handlers.enter();
            let slots: Vec<HandlerSlot> =
                unsafe { &*self.table.get() }.iter().filter_map(|s| *s).collect();
            self.handlers.leave();
            for bit in 0..32u8 {
                if snapshot & (1 << bit) == 0 {
                    continue;
                }
                for slot in &slots {
                    if slot.intr_id == bit {
                        (slot.handler)(bit, slot.arg);
                    }
                }
            }
        }
    }
}
