// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Shared-memory transport stack for asymmetric multiprocessing (AMP): a
// descriptor queue, a multiplexed message bus on top of it, and an RPC
// layer on top of that, connecting a main core and a subcore across a
// cross-core software interrupt.

pub mod shm_name;

mod platform;

mod shm;
pub use shm::{ShmHandle, ShmOpenMode};

mod mutex;
pub use mutex::IpcMutex;

mod condition;
pub use condition::IpcCondition;

mod waiter;
pub use waiter::Waiter;

mod scoped_access;
pub use scoped_access::ScopedAccess;

mod spin_lock;
pub use spin_lock::SpinLock;

mod buffer;
pub use buffer::IpcBuffer;

pub mod error;
pub use error::{AmpError, AmpResult};

pub mod fence;

pub mod sync;
pub use sync::{CriticalSection, SpinCriticalSection};

pub mod time;
pub use time::{Clock, SystemClock};

pub mod shared_info;
pub use shared_info::{SharedInfoRegistry, SysInfoId};

pub mod signal;
pub use signal::{CrossCoreSignal, SignalTarget, SwIntrId};

pub mod queue;
pub use queue::{Descriptor, Queue, QueueConfig, QueueRole};

pub mod bus;
pub use bus::{Device, Endpoint, EndpointAddr};

pub mod rpc;
pub use rpc::{RpcPacket, RpcStatus, ServiceTable};
