// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Wire format of the RPC packet (section 6): req_id, service_id, status,
// params_len, then params inline. Carried as the payload of a bus message.

pub const HEADER_SIZE: usize = 8;

/// Status taxonomy mirroring the original `esp_amp_rpc_status_t`. Values are
/// part of the wire format and must not be renumbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum RpcStatus {
    Ok = 0,
    Timeout = 1,
    NoService = 2,
    ExecFailed = 3,
    NoMem = 4,
    QueueFull = 5,
    InvalidArg = 6,
}

impl RpcStatus {
    pub fn from_wire(v: u16) -> Self {
        match v {
            0 => RpcStatus::Ok,
            1 => RpcStatus::Timeout,
            2 => RpcStatus::NoService,
            3 => RpcStatus::ExecFailed,
            4 => RpcStatus::NoMem,
            5 => RpcStatus::QueueFull,
            _ => RpcStatus::InvalidArg,
        }
    }
}

#[repr(C)]
pub struct RpcPacket {
    pub req_id: u16,
    pub service_id: u16,
    pub status: u16,
    pub params_len: u16,
}

impl RpcPacket {
    /// Write the header at the start of `slot`.
    ///
    /// # Safety
    /// `slot` must be valid for `HEADER_SIZE` bytes.
    pub unsafe fn write(slot: *mut u8, req_id: u16, service_id: u16, status: RpcStatus, params_len: u16) {
        let hdr = slot as *mut RpcPacket;
        (*hdr).req_id = req_id;
        (*hdr).service_id = service_id;
        (*hdr).status = status as u16;
        (*hdr).params_len = params_len;
    }

    /// Read the header at the start of `slot`. Returns `None` if `len` is
    /// too short to hold a header (a short/corrupt packet per section 7).
    ///
    /// # Safety
    /// `slot` must be valid for at least `len` bytes.
    pub unsafe fn read(slot: *const u8, len: usize) -> Option<RpcPacket> {
        if len < HEADER_SIZE {
            return None;
        }
        let hdr = slot as *const RpcPacket;
        Some(RpcPacket {
            req_id: (*hdr).req_id,
            service_id: (*hdr).service_id,
            status: (*hdr).status,
            params_len: (*hdr).params_len,
        })
    }

    pub unsafe fn params(slot: *const u8) -> *const u8 {
        slot.add(HEADER_SIZE)
    }

    pub unsafe fn params_mut(slot: *mut u8) -> *mut u8 {
        slot.add(HEADER_SIZE)
    }
}
