// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// The process-wide critical-section primitive is an external collaborator:
// on a single-CPU target it masks interrupts, under SMP a ticket lock is
// acceptable. We model it as a trait so the queue/bus/signal layers never
// hard-code which one is in effect, and provide a spin-lock-based default
// (port of `SpinLock` from spin_lock.rs) suitable for host tests and for
// any SMP target that doesn't have a cheaper primitive.

use crate::SpinLock;

/// A reentrant-free mutual exclusion primitive guarding the per-core tables
/// (endpoint list, service table, pending-request table, handler table).
///
/// Implementations must not block indefinitely in a way that prevents the
/// cross-core interrupt handler from eventually running, since on a
/// single-CPU subcore "enter" commonly means masking interrupts.
pub trait CriticalSection: Send + Sync {
    /// Enter the critical section. Must be paired with exactly one `leave`.
    fn enter(&self);
    /// Leave the critical section.
    fn leave(&self);
}

/// Default critical section: a spin lock with adaptive backoff.
///
/// Stands in for "mask interrupts" on bare-metal targets where the real
/// primitive lives outside this crate's scope.
pub struct SpinCriticalSection {
    lock: SpinLock,
}

impl SpinCriticalSection {
    pub const fn new() -> Self {
        Self { lock: SpinLock::new() }
    }
}

impl Default for SpinCriticalSection {
    fn default() -> Self {
        Self::new()
    }
}

impl CriticalSection for SpinCriticalSection {
    fn enter(&self) {
        self.lock.lock();
    }

    fn leave(&self) {
        self.lock.unlock();
    }
}

/// RAII guard returned by [`guard`]. Leaves the section on drop.
pub struct CriticalSectionGuard<'a, C: CriticalSection + ?Sized> {
    cs: &'a C,
}

impl<'a, C: CriticalSection + ?Sized> Drop for CriticalSectionGuard<'a, C> {
    fn drop(&mut self) {
        self.cs.leave();
    }
}

/// Enter `cs` and return a guard that leaves it on drop.
pub fn guard<C: CriticalSection + ?Sized>(cs: &C) -> CriticalSectionGuard<'_, C> {
    cs.enter();
    CriticalSectionGuard { cs }
}
