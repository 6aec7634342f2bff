// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Error taxonomy for the queue/bus layers. Port of the error surface of
// esp_amp_queue.c and esp_amp_rpmsg.c (ESP_AMP_ERR_NOT_FOUND,
// ESP_AMP_ERR_NOT_SUPPORTED, ESP_AMP_ERR_NOT_ALLOWED, ESP_AMP_ERR_NO_MEM),
// with a Fatal variant for invariant violations the original logs and
// aborts on. The RPC layer has its own wire status (see `rpc::RpcStatus`);
// this is the lower-layer error each higher layer translates away.

use std::fmt;

/// Error returned by the descriptor queue and message bus.
///
/// Propagation policy: each layer translates these into its own taxonomy.
/// A caller of the bus or RPC API should never see this type directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmpError {
    /// Transient: nothing to receive, or the master's free pool is empty.
    NotFound,
    /// Usage: the operation was attempted from the wrong role.
    NotSupported,
    /// Usage: `send` before `alloc`, or `free` before `recv`.
    NotAllowed,
    /// Usage/Resource: payload larger than `max_item_size`, or no room for it.
    NoMem,
    /// Fatal: an internal invariant was violated (e.g. `send` found the slot
    /// not USED). The original firmware logs and aborts on this; we return
    /// it instead so the caller can decide, but it should never be routed
    /// past a public API unchanged.
    Fatal(&'static str),
}

impl fmt::Display for AmpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not found"),
            Self::NotSupported => write!(f, "operation not supported in this role"),
            Self::NotAllowed => write!(f, "operation not allowed in current state"),
            Self::NoMem => write!(f, "no memory / payload too large"),
            Self::Fatal(msg) => write!(f, "fatal: {msg}"),
        }
    }
}

impl std::error::Error for AmpError {}

pub type AmpResult<T> = Result<T, AmpError>;

impl AmpError {
    /// Whether this error should be logged at error level. Transient
    /// conditions (queue empty/full) are expected traffic and are not.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::NotFound)
    }
}
