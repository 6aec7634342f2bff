// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Request/response layer on top of the message bus. One server type, two
// client backends: preemptive (blocking, timeout-aware) and cooperative
// (callback-and-poll, no blocking).

mod packet;
mod server;
mod client_preemptive;
mod client_cooperative;

pub use packet::{RpcPacket, RpcStatus};
pub use server::{ServerLifecycle, ServiceHandler, ServiceTable, RpcServer};
pub use client_preemptive::{RpcClientPreemptive, RpcRequest};
pub use client_cooperative::{RequestCallback, RpcClientCooperative};
