// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Integration tests for the cross-core signal: coalescing, handler
// dispatch, and the "pending word reads 0 after drain" invariant.

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

use amp_ipc::signal::{CrossCoreSignal, HwSignalLine, PendingBits, SignalTarget};

struct CountingLine {
    raises: AtomicUsize,
}

impl HwSignalLine for CountingLine {
    fn raise(&self) {
        self.raises.fetch_add(1, Ordering::SeqCst);
    }
}

fn leak_bits() -> &'static PendingBits {
    Box::leak(Box::new(PendingBits::new()))
}

#[test]
fn trigger_then_dispatch_invokes_handler() {
    let bits = leak_bits();
    let main = unsafe { CrossCoreSignal::new(bits, SignalTarget::Main, CountingLine { raises: AtomicUsize::new(0) }) };
    let sub = unsafe { CrossCoreSignal::new(bits, SignalTarget::Sub, CountingLine { raises: AtomicUsize::new(0) }) };

    static HITS: AtomicUsize = AtomicUsize::new(0);
    fn handler(_bit: u8, _arg: *mut ()) {
        HITS.fetch_add(1, Ordering::SeqCst);
    }
    sub.add_handler(3, handler, std::ptr::null_mut()).unwrap();

    main.trigger(3);
    sub.on_hw_interrupt();
    assert_eq!(HITS.load(Ordering::SeqCst), 1);
}

#[test]
fn coalesced_triggers_fire_handler_once_per_drain() {
    let bits = leak_bits();
    let main = unsafe { CrossCoreSignal::new(bits, SignalTarget::Main, CountingLine { raises: AtomicUsize::new(0) }) };
    let sub = unsafe { CrossCoreSignal::new(bits, SignalTarget::Sub, CountingLine { raises: AtomicUsize::new(0) }) };

    static HITS: AtomicUsize = AtomicUsize::new(0);
    fn handler(_bit: u8, _arg: *mut ()) {
        HITS.fetch_add(1, Ordering::SeqCst);
    }
    sub.add_handler(1, handler, std::ptr::null_mut()).unwrap();

    main.trigger(1);
    main.trigger(1);
    main.trigger(1);
    sub.on_hw_interrupt();
    assert_eq!(HITS.load(Ordering::SeqCst), 1);
}

#[test]
fn pending_word_is_zero_after_drain() {
    let bits = leak_bits();
    let main = unsafe { CrossCoreSignal::new(bits, SignalTarget::Main, CountingLine { raises: AtomicUsize::new(0) }) };
    let sub = unsafe { CrossCoreSignal::new(bits, SignalTarget::Sub, CountingLine { raises: AtomicUsize::new(0) }) };

    main.trigger(2);
    sub.on_hw_interrupt();
    assert_eq!(bits.sub_pending_bits.load(Ordering::SeqCst), 0);
}

#[test]
fn delete_handler_stops_future_dispatch() {
    let bits = leak_bits();
    let main = unsafe { CrossCoreSignal::new(bits, SignalTarget::Main, CountingLine { raises: AtomicUsize::new(0) }) };
    let sub = unsafe { CrossCoreSignal::new(bits, SignalTarget::Sub, CountingLine { raises: AtomicUsize::new(0) }) };

    static HITS: AtomicUsize = AtomicUsize::new(0);
    fn handler(_bit: u8, _arg: *mut ()) {
        HITS.fetch_add(1, Ordering::SeqCst);
    }
    sub.add_handler(0, handler, std::ptr::null_mut()).unwrap();
    sub.delete_handler(0, handler);

    main.trigger(0);
    sub.on_hw_interrupt();
    assert_eq!(HITS.load(Ordering::SeqCst), 0);
}

#[test]
fn multiple_handlers_for_same_bit_all_run() {
    let bits = leak_bits();
    let main = unsafe { CrossCoreSignal::new(bits, SignalTarget::Main, CountingLine { raises: AtomicUsize::new(0) }) };
    let sub = unsafe { CrossCoreSignal::new(bits, SignalTarget::Sub, CountingLine { raises: AtomicUsize::new(0) }) };

    static COUNTER: AtomicU32 = AtomicU32::new(0);
    fn h1(_bit: u8, _arg: *mut ()) {
        COUNTER.fetch_add(1, Ordering::SeqCst);
    }
    fn h2(_bit: u8, _arg: *mut ()) {
        COUNTER.fetch_add(10, Ordering::SeqCst);
    }
    sub.add_handler(5, h1, std::ptr::null_mut()).unwrap();
    sub.add_handler(5, h2, std::ptr::null_mut()).unwrap();

    main.trigger(5);
    sub.on_hw_interrupt();
    assert_eq!(COUNTER.load(Ordering::SeqCst), 11);
}
