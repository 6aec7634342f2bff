// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Port of esp_amp_queue.c / esp_amp_queue.h — the central protocol of the
// stack. A single ring of `N` (power of two) descriptors shared between a
// master (producer/allocator) and a remote (consumer/releaser) side.
// Ownership of a slot transfers by flipping one of two independent 1-bit
// flags relative to a per-cursor "flip counter", so the protocol needs only
// plain loads/stores and a memory fence — never a shared-memory CAS,
// because each bit is written by exactly one side. See `fence::full_fence`.
//
// `Descriptor::addr` is a byte offset into the buffer slab rather than an
// absolute pointer (see `shared_info.rs` for why); `Queue` translates it
// against its own `slab_base`.

use std::cell::Cell;
use std::sync::atomic::{AtomicU16, Ordering};

use crate::{AmpError, AmpResult};

/// Bit 7: set by the master when a slot holds a payload ready to send.
const AVAILABLE_BIT: u16 = 1 << 7;
/// Bit 15: set by the remote when a slot has been returned to the master.
const USED_BIT: u16 = 1 << 15;

fn avail_mask(bit: u8) -> u16 {
    (bit as u16) << 7
}

fn used_mask(bit: u8) -> u16 {
    (bit as u16) << 15
}

/// Owned by the master, empty and ready for `alloc`.
fn is_used(flip: u8, flags: u16) -> bool {
    (flags & AVAILABLE_BIT) != avail_mask(flip) && (flags & USED_BIT) != used_mask(flip)
}

/// Owned by the remote, carrying data ready for `recv`.
fn is_available(flip: u8, flags: u16) -> bool {
    (flags & AVAILABLE_BIT) == avail_mask(flip) && (flags & USED_BIT) != used_mask(flip)
}

/// One cell of the ring. `addr`/`len` are plain (non-atomic) fields: only
/// the side that currently owns the slot touches them, and ownership is
/// established by the `flags` flip below. `flags` alone is the
/// cross-visible synchronization word.
#[repr(C)]
pub struct Descriptor {
    pub addr: u32,
    pub len: u16,
    flags: AtomicU16,
}

/// Lay out `size` descriptors, each pointing at `slab_base + i*item_size`,
/// ready for the flip-counter protocol starting at flip = 1 on both sides.
/// Port of `esp_amp_queue_init_buffer`.
pub fn init_buffer(descriptors: *mut Descriptor, size: u16, item_size: u16) {
    for i in 0..size {
        unsafe {
            let d = descriptors.add(i as usize);
            (*d).addr = i as u32 * item_size as u32;
            (*d).len = item_size;
            (*d).flags = AtomicU16::new(0);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueRole {
    Master,
    Remote,
}

/// `{queue_size, max_queue_item_size}` — the part of the wire queue
/// configuration entry (section 6) that isn't a pointer.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct QueueConfig {
    pub size: u16,
    pub max_item_size: u16,
}

/// One side's handle onto a descriptor ring. A queue *pair* is two of
/// these, master on one side and remote on the other, sharing the same
/// `descriptors` ring and `slab_base`.
///
/// Port of `esp_amp_queue_t`. Not `Sync` by the type system's own
/// judgement — the caller (the message bus) is responsible for serializing
/// concurrent callers on the same side via the process-wide critical
/// section; this mirrors the bare-metal original, which has no borrow
/// checker to lean on either.
pub struct Queue {
    descriptors: *mut Descriptor,
    slab_base: *mut u8,
    size: u16,
    max_item_size: u16,
    role: QueueRole,
    free_index: Cell<u16>,
    free_flip: Cell<u8>,
    used_index: Cell<u16>,
    used_flip: Cell<u8>,
    notify: Option<Box<dyn Fn() + Send + Sync>>,
}

unsafe impl Send for Queue {}
unsafe impl Sync for Queue {}

impl Queue {
    /// Build a handle over an existing ring. `descriptors` must point at
    /// `size` live `Descriptor` cells (normally laid out by
    /// [`init_buffer`]) reachable by both cores; `slab_base` is the base
    /// that `Descriptor::addr` offsets are relative to.
    ///
    /// `notify`, if set, is called after every successful `send` — wire it
    /// to `CrossCoreSignal::trigger` for the direction this queue feeds.
    ///
    /// # Safety
    /// `descriptors` and `slab_base` must remain valid and exclusively
    /// owned by this role for the handle's lifetime.
    pub unsafe fn from_raw(
        descriptors: *mut Descriptor,
        slab_base: *mut u8,
        size: u16,
        max_item_size: u16,
        role: QueueRole,
        notify: Option<Box<dyn Fn() + Send + Sync>>,
    ) -> Self {
        assert!(size.is_power_of_two(), "queue size must be a power of two");
        Self {
            descriptors,
            slab_base,
            size,
            max_item_size,
            role,
            free_index: Cell::new(0),
            free_flip: Cell::new(1),
            used_index: Cell::new(0),
            used_flip: Cell::new(1),
            notify,
        }
    }

    pub fn max_item_size(&self) -> u16 {
        self.max_item_size
    }

    pub fn size(&self) -> u16 {
        self.size
    }

    fn desc(&self, idx: u16) -> *mut Descriptor {
        unsafe { self.descriptors.add(idx as usize) }
    }

    fn to_ptr(&self, addr: u32) -> *mut u8 {
        unsafe { self.slab_base.add(addr as usize) }
    }

    fn to_offset(&self, ptr: *mut u8) -> u32 {
        (ptr as usize - self.slab_base as usize) as u32
    }

    fn advance(index: &Cell<u16>, flip: &Cell<u8>, size: u16) {
        let next = index.get() + 1;
        if next == size {
            index.set(0);
            flip.set(flip.get() ^ 1);
        } else {
            index.set(next);
        }
    }

    /// Reserve the next free slot's buffer for filling. Master only.
    pub fn alloc(&self, size: u16) -> AmpResult<*mut u8> {
        if self.role != QueueRole::Master {
            return Err(AmpError::NotSupported);
        }
        if size > self.max_item_size {
            return Err(AmpError::NoMem);
        }
        let d = self.desc(self.free_index.get());
        let flags = unsafe { (*d).flags.load(Ordering::Relaxed) };
        crate::fence::full_fence();
        if !is_used(self.free_flip.get(), flags) {
            return Err(AmpError::NotFound);
        }
        let addr = unsafe { (*d).addr };
        Self::advance(&self.free_index, &self.free_flip, self.size);
        Ok(self.to_ptr(addr))
    }

    /// Publish a previously allocated slot as available. Master only.
    pub fn send(&self, buf: *mut u8, size: u16) -> AmpResult<()> {
        if self.role != QueueRole::Master {
            return Err(AmpError::NotSupported);
        }
        if self.used_index.get() == self.free_index.get() && self.used_flip.get() == self.free_flip.get() {
            return Err(AmpError::NotAllowed);
        }
        if size > self.max_item_size {
            return Err(AmpError::NoMem);
        }
        let d = self.desc(self.used_index.get());
        let flags = unsafe { (*d).flags.load(Ordering::Relaxed) };
        crate::fence::full_fence();
        if !is_used(self.used_flip.get(), flags) {
            return Err(AmpError::Fatal("send: slot not USED"));
        }
        unsafe {
            (*d).addr = self.to_offset(buf);
            (*d).len = size;
        }
        crate::fence::full_fence();
        let new_flags = flags ^ AVAILABLE_BIT;
        unsafe { (*d).flags.store(new_flags, Ordering::Release) };
        Self::advance(&self.used_index, &self.used_flip, self.size);
        if let Some(notify) = &self.notify {
            notify();
        }
        Ok(())
    }

    /// Take the next available slot for consumption. Remote only.
    pub fn recv(&self) -> AmpResult<(*mut u8, u16)> {
        if self.role != QueueRole::Remote {
            return Err(AmpError::NotSupported);
        }
        let d = self.desc(self.free_index.get());
        let flags = unsafe { (*d).flags.load(Ordering::Relaxed) };
        crate::fence::full_fence();
        if !is_available(self.free_flip.get(), flags) {
            return Err(AmpError::NotFound);
        }
        let (addr, len) = unsafe { ((*d).addr, (*d).len) };
        Self::advance(&self.free_index, &self.free_flip, self.size);
        Ok((self.to_ptr(addr), len))
    }

    /// Return a consumed slot to the master's free pool. Remote only.
    pub fn free(&self, buf: *mut u8) -> AmpResult<()> {
        if self.role != QueueRole::Remote {
            return Err(AmpError::NotSupported);
        }
        if self.used_index.get() == self.free_index.get() && self.used_flip.get() == self.free_flip.get() {
            return Err(AmpError::NotAllowed);
        }
        let d = self.desc(self.used_index.get());
        let flags = unsafe { (*d).flags.load(Ordering::Relaxed) };
        crate::fence::full_fence();
        if !is_available(self.used_flip.get(), flags) {
            return Err(AmpError::Fatal("free: slot not AVAILABLE"));
        }
        unsafe {
            (*d).addr = self.to_offset(buf);
            (*d).len = self.max_item_size;
        }
        crate::fence::full_fence();
        let new_flags = flags ^ USED_BIT;
        unsafe { (*d).flags.store(new_flags, Ordering::Release) };
        Self::advance(&self.used_index, &self.used_flip, self.size);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_pair(n: u16, item_size: u16) -> (Vec<Descriptor>, Vec<u8>) {
        let mut descs = Vec::with_capacity(n as usize);
        for _ in 0..n {
            descs.push(Descriptor { addr: 0, len: 0, flags: AtomicU16::new(0) });
        }
        let slab = vec![0u8; n as usize * item_size as usize];
        (descs, slab)
    }

    unsafe fn build(descs: &mut [Descriptor], slab: &mut [u8], item_size: u16, role: QueueRole) -> Queue {
        let n = descs.len() as u16;
        init_buffer(descs.as_mut_ptr(), n, item_size);
        Queue::from_raw(descs.as_mut_ptr(), slab.as_mut_ptr(), n, item_size, role, None)
    }

    #[test]
    fn single_message_round_trip() {
        let (mut descs, mut slab) = make_pair(4, 64);
        let master = unsafe { build(&mut descs, &mut slab, 64, QueueRole::Master) };
        let remote = unsafe { build(&mut descs, &mut slab, 64, QueueRole::Remote) };

        for _ in 0..20 {
            let buf = master.alloc(8).expect("alloc");
            let bytes = [1u8, 2, 3, 4, 5, 6, 7, 8];
            unsafe { std::ptr::copy_nonoverlapping(bytes.as_ptr(), buf, 8) };
            master.send(buf, 8).expect("send");

            let (rbuf, len) = remote.recv().expect("recv");
            assert_eq!(len, 8);
            let got = unsafe { std::slice::from_raw_parts(rbuf, 8) };
            assert_eq!(got, &bytes);
            remote.free(rbuf).expect("free");
        }
    }

    #[test]
    fn fill_and_drain_wraps_flip_counter() {
        let (mut descs, mut slab) = make_pair(4, 64);
        let master = unsafe { build(&mut descs, &mut slab, 64, QueueRole::Master) };
        let remote = unsafe { build(&mut descs, &mut slab, 64, QueueRole::Remote) };

        for _ in 0..4 {
            let buf = master.alloc(4).unwrap();
            master.send(buf, 4).unwrap();
        }
        assert!(matches!(master.alloc(4), Err(AmpError::NotFound)));

        for _ in 0..2 {
            let (buf, _) = remote.recv().unwrap();
            remote.free(buf).unwrap();
        }

        assert_eq!(master.free_index.get(), 0);
        assert_eq!(master.free_flip.get(), 0);
        let buf = master.alloc(4).expect("alloc after drain wraps");
        assert_eq!(master.to_offset(buf), 0);
    }

    #[test]
    fn send_before_alloc_is_not_allowed() {
        let (mut descs, mut slab) = make_pair(4, 64);
        let master = unsafe { build(&mut descs, &mut slab, 64, QueueRole::Master) };
        assert!(matches!(master.send(std::ptr::null_mut(), 0), Err(AmpError::NotAllowed)));
    }

    #[test]
    fn free_before_recv_is_not_allowed() {
        let (mut descs, mut slab) = make_pair(4, 64);
        let remote = unsafe { build(&mut descs, &mut slab, 64, QueueRole::Remote) };
        assert!(matches!(remote.free(std::ptr::null_mut()), Err(AmpError::NotAllowed)));
    }

    #[test]
    fn oversized_send_is_no_mem() {
        let (mut descs, mut slab) = make_pair(4, 64);
        let master = unsafe { build(&mut descs, &mut slab, 64, QueueRole::Master) };
        let buf = master.alloc(8).unwrap();
        assert!(matches!(master.send(buf, 128), Err(AmpError::NoMem)));
    }

    #[test]
    fn remote_recv_on_empty_is_not_found() {
        let (mut descs, mut slab) = make_pair(4, 64);
        let remote = unsafe { build(&mut descs, &mut slab, 64, QueueRole::Remote) };
        assert!(matches!(remote.recv(), Err(AmpError::NotFound)));
    }

    #[test]
    fn master_alloc_while_unconsumed_is_not_found() {
        let (mut descs, mut slab) = make_pair(1, 64);
        let master = unsafe { build(&mut descs, &mut slab, 64, QueueRole::Master) };
        let buf = master.alloc(4).unwrap();
        master.send(buf, 4).unwrap();
        assert!(matches!(master.alloc(4), Err(AmpError::NotFound)));
    }
}
