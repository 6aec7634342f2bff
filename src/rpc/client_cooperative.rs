// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Port of esp_amp_rpc_client.c's cooperative backend: no tasks, no blocking
// queues, a static pool of `M` pending slots scanned by the app's own main
// loop. `req_id == 0` marks an empty slot.

use std::cell::{Cell, UnsafeCell};
use std::mem::MaybeUninit;

use super::packet::{self, RpcPacket, RpcStatus};
use crate::bus::{Device, Endpoint, EndpointAddr};
use crate::time::Clock;
use crate::{AmpError, AmpResult};

/// `(status, params, cb_data)`. Called from [`RpcClientCooperative::poll`]
/// or [`RpcClientCooperative::complete_timeout_request`], never reentrantly.
pub type RequestCallback = fn(status: RpcStatus, params: &[u8], cb_data: *mut ());

#[derive(Clone, Copy)]
struct CoopSlot {
    req_id: u16,
    buf: *mut u8,
    buf_len: u16,
    start_time_ms: u64,
    timeout_ms: u64,
    cb: Option<RequestCallback>,
    cb_data: *mut (),
}

unsafe impl Send for CoopSlot {}

/// Single-threaded RPC client: `create_request` allocates and stages a
/// packet, `execute_request_with_cb` sends it, and the app loop drives
/// completion via `poll` and `complete_timeout_request`.
pub struct RpcClientCooperative<'a, const M: usize, C: Clock> {
    device: &'a Device<'a>,
    client_addr: EndpointAddr,
    server_addr: EndpointAddr,
    clock: C,
    next_req_id: Cell<u16>,
    slots: UnsafeCell<[Option<CoopSlot>; M]>,
    endpoint: UnsafeCell<MaybeUninit<Endpoint>>,
}

unsafe impl<'a, const M: usize, C: Clock> Sync for RpcClientCooperative<'a, M, C> {}

impl<'a, const M: usize, C: Clock> RpcClientCooperative<'a, M, C> {
    pub fn new(device: &'a Device<'a>, client_addr: EndpointAddr, server_addr: EndpointAddr, clock: C) -> Self {
        Self {
            device,
            client_addr,
            server_addr,
            clock,
            next_req_id: Cell::new(1),
            slots: UnsafeCell::new([None; M]),
            endpoint: UnsafeCell::new(MaybeUninit::uninit()),
        }
    }

    pub fn start(&'static self) -> AmpResult<()> {
        let storage = self.endpoint.get() as *mut Endpoint;
        self.device.create_endpoint(self.client_addr, Some(dispatch::<M, C>), self as *const Self as *mut (), storage)?;
        Ok(())
    }

    fn alloc_req_id(&self) -> u16 {
        let id = self.next_req_id.get();
        self.next_req_id.set(if id >= i16::MAX as u16 { 1 } else { id + 1 });
        id
    }

    /// Finds an empty slot, allocates and stages the outbound packet.
    /// Fails with [`AmpError::NoMem`] if the pool is full.
    pub fn create_request(&self, service_id: u16, params: &[u8]) -> AmpResult<u16> {
        let slots = unsafe { &mut *self.slots.get() };
        let idx = slots.iter().position(|s| s.is_none()).ok_or(AmpError::NoMem)?;

        let req_id = self.alloc_req_id();
        let buf_len = packet::HEADER_SIZE as u16 + params.len() as u16;
        let buf = self.device.create_msg(buf_len)?;
        unsafe {
            RpcPacket::write(buf, req_id, service_id, RpcStatus::Ok, params.len() as u16);
            std::ptr::copy_nonoverlapping(params.as_ptr(), RpcPacket::params_mut(buf), params.len());
        }

        slots[idx] = Some(CoopSlot {
            req_id,
            buf,
            buf_len,
            start_time_ms: 0,
            timeout_ms: 0,
            cb: None,
            cb_data: std::ptr::null_mut(),
        });
        Ok(req_id)
    }

    /// Attaches `cb`/`timeout_ms` to a request created with
    /// [`create_request`](Self::create_request) and sends it.
    pub fn execute_request_with_cb(
        &self,
        req_id: u16,
        cb: RequestCallback,
        cb_data: *mut (),
        timeout_ms: u64,
    ) -> AmpResult<()> {
        let slots = unsafe { &mut *self.slots.get() };
        let slot = slots
            .iter_mut()
            .flatten()
            .find(|s| s.req_id == req_id)
            .ok_or(AmpError::NotFound)?;
        slot.cb = Some(cb);
        slot.cb_data = cb_data;
        slot.timeout_ms = timeout_ms;
        slot.start_time_ms = self.clock.now_ms();
        let (buf, len) = (slot.buf, slot.buf_len);
        self.device.send_nocopy(buf, self.client_addr, self.server_addr, len)
    }

    /// Drains one bus message through the registered endpoint callback.
    /// Returns what `Device::poll` returns: `0` on a message handled, `-1`
    /// if none was pending.
    pub fn poll(&self) -> i32 {
        self.device.poll()
    }

    /// Scan for expired slots and fire their callback with
    /// `(Timeout, &[], cb_data)`. Must be called periodically for timeouts
    /// to progress; resolution is the cadence of these calls.
    pub fn complete_timeout_request(&self) {
        let now = self.clock.now_ms();
        let slots = unsafe { &mut *self.slots.get() };
        for slot_opt in slots.iter_mut() {
            let expired = matches!(slot_opt, Some(s) if s.timeout_ms > 0 && now.saturating_sub(s.start_time_ms) >= s.timeout_ms);
            if expired {
                let slot = slot_opt.take().unwrap();
                if let Some(cb) = slot.cb {
                    cb(RpcStatus::Timeout, &[], slot.cb_data);
                }
            }
        }
    }

    fn on_response(&self, payload: &[u8]) {
        let slot_ptr = payload.as_ptr() as *mut u8;
        let hdr = match unsafe { RpcPacket::read(payload.as_ptr(), payload.len()) } {
            Some(hdr) => hdr,
            None => {
                let _ = self.device.destroy(slot_ptr);
                return;
            }
        };

        let slots = unsafe { &mut *self.slots.get() };
        if let Some(pos) = slots.iter().position(|s| matches!(s, Some(cs) if cs.req_id == hdr.req_id)) {
            let slot = slots[pos].take().unwrap();
            let params =
                unsafe { std::slice::from_raw_parts(RpcPacket::params(payload.as_ptr()), hdr.params_len as usize) };
            if let Some(cb) = slot.cb {
                cb(RpcStatus::from_wire(hdr.status), params, slot.cb_data);
            }
        }
        // No matching slot: already timed out. Release silently.
        let _ = self.device.destroy(slot_ptr);
    }
}

fn dispatch<const M: usize, C: Clock>(payload: &[u8], _src_addr: EndpointAddr, cb_data: *mut ()) {
    let client = unsafe { &*(cb_data as *const RpcClientCooperative<'static, M, C>) };
    client.on_response(payload);
}
