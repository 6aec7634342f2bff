// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Port of esp_amp_rpc_client.c's preemptive backend. The original hands
// requests to a sender task over a bounded queue and wakes callers from a
// receiver task via a per-request response queue; on a host runtime the
// idiomatic equivalent of "one-shot response queue plus an event group" is
// a `Condvar` per pending request, so `execute_request` sends directly and
// waits on its own request's `Condvar` rather than routing through
// dedicated sender/receiver threads.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::packet::{self, RpcPacket, RpcStatus};
use crate::bus::{Device, Endpoint, EndpointAddr};
use crate::{AmpError, AmpResult};

struct PendingEntry {
    req_id: u16,
    result: Mutex<Option<(RpcStatus, Vec<u8>)>>,
    cv: std::sync::Condvar,
}

/// A request built by [`RpcClientPreemptive::create_request`] but not yet
/// sent. Holds the only reference to its outbound buffer; dropping it
/// without calling `execute_request` leaks the buffer, matching the
/// original's "caller must execute or destroy every created request".
pub struct RpcRequest {
    req_id: u16,
    buf: *mut u8,
    len: u16,
    entry: Arc<PendingEntry>,
}

unsafe impl Send for RpcRequest {}

impl RpcRequest {
    pub fn req_id(&self) -> u16 {
        self.req_id
    }
}

struct ReqIdAllocator {
    next: Mutex<u16>,
}

impl ReqIdAllocator {
    fn new() -> Self {
        Self { next: Mutex::new(1) }
    }

    /// Skips 0 (reserved invalid); wraps past `i16::MAX` back to 1.
    fn alloc(&self) -> u16 {
        let mut next = self.next.lock().unwrap();
        let id = *next;
        *next = if id >= i16::MAX as u16 { 1 } else { id + 1 };
        id
    }
}

/// Client endpoint with blocking, timeout-aware request execution.
pub struct RpcClientPreemptive<'a> {
    device: &'a Device<'a>,
    client_addr: EndpointAddr,
    server_addr: EndpointAddr,
    req_ids: ReqIdAllocator,
    pending: Mutex<Vec<Arc<PendingEntry>>>,
    endpoint: std::cell::UnsafeCell<std::mem::MaybeUninit<Endpoint>>,
}

unsafe impl<'a> Sync for RpcClientPreemptive<'a> {}

impl<'a> RpcClientPreemptive<'a> {
    pub fn new(device: &'a Device<'a>, client_addr: EndpointAddr, server_addr: EndpointAddr) -> Self {
        Self {
            device,
            client_addr,
            server_addr,
            req_ids: ReqIdAllocator::new(),
            pending: Mutex::new(Vec::new()),
            endpoint: std::cell::UnsafeCell::new(std::mem::MaybeUninit::uninit()),
        }
    }

    /// Registers the client's response-dispatch endpoint. Must be called
    /// before any `create_request`.
    pub fn start(&'static self) -> AmpResult<()> {
        let storage = self.endpoint.get() as *mut Endpoint;
        self.device.create_endpoint(self.client_addr, Some(dispatch), self as *const Self as *mut (), storage)?;
        Ok(())
    }

    pub fn stop(&self) {
        self.device.delete_endpoint(self.client_addr);
    }

    /// Allocates the outbound packet and reserves a pending-table slot.
    /// Does not send; call [`execute_request`](Self::execute_request) to
    /// dispatch and wait.
    pub fn create_request(&self, service_id: u16, params: &[u8]) -> AmpResult<RpcRequest> {
        let req_id = self.req_ids.alloc();
        let len = packet::HEADER_SIZE as u16 + params.len() as u16;
        let buf = self.device.create_msg(len)?;
        unsafe {
            RpcPacket::write(buf, req_id, service_id, RpcStatus::Ok, params.len() as u16);
            std::ptr::copy_nonoverlapping(params.as_ptr(), RpcPacket::params_mut(buf), params.len());
        }
        let entry = Arc::new(PendingEntry { req_id, result: Mutex::new(None), cv: std::sync::Condvar::new() });
        self.pending.lock().unwrap().push(entry.clone());
        Ok(RpcRequest { req_id, buf, len, entry })
    }

    /// Sends `req` and blocks on its response. `timeout_ms = None` waits
    /// forever. On timeout the pending-table entry is dropped; a late
    /// server response is then released silently by `on_response`.
    pub fn execute_request(&self, req: RpcRequest, timeout_ms: Option<u64>) -> AmpResult<(RpcStatus, Vec<u8>)> {
        if let Err(e) = self.device.send_nocopy(req.buf, self.client_addr, self.server_addr, req.len) {
            self.remove_pending(req.req_id);
            return Err(e);
        }

        let mut guard = req.entry.result.lock().unwrap();
        loop {
            if let Some(result) = guard.take() {
                self.remove_pending(req.req_id);
                return Ok(result);
            }
            match timeout_ms {
                None => guard = req.entry.cv.wait(guard).unwrap(),
                Some(ms) => {
                    let (next_guard, timeout) =
                        req.entry.cv.wait_timeout(guard, Duration::from_millis(ms)).unwrap();
                    guard = next_guard;
                    if timeout.timed_out() {
                        let result = guard.take();
                        self.remove_pending(req.req_id);
                        return Ok(result.unwrap_or((RpcStatus::Timeout, Vec::new())));
                    }
                }
            }
        }
    }

    /// Releases a request without sending it, or after `execute_request`
    /// already returned. Removes the pending-table entry so a late server
    /// response is dropped silently by `on_response` instead of matching a
    /// stale slot. Safe to call on a request that was never sent.
    pub fn destroy_request(&self, req: RpcRequest) {
        self.remove_pending(req.req_id);
        let _ = self.device.destroy(req.buf);
    }

    fn remove_pending(&self, req_id: u16) {
        let mut pending = self.pending.lock().unwrap();
        if let Some(pos) = pending.iter().position(|e| e.req_id == req_id) {
            pending.remove(pos);
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

        let entry = {
            let pending = self.pending.lock().unwrap();
            pending.iter().find(|e| e.req_id == hdr.req_id).cloned()
        };

        if let Some(entry) = entry {
            let params =
                unsafe { std::slice::from_raw_parts(RpcPacket::params(payload.as_ptr()), hdr.params_len as usize) }
                    .to_vec();
            *entry.result.lock().unwrap() = Some((RpcStatus::from_wire(hdr.status), params));
            entry.cv.notify_all();
        }
        // Not found: the request already timed out and was destroyed. Drop.
        let _ = self.device.destroy(slot_ptr);
    }
}

fn dispatch(payload: &[u8], _src_addr: EndpointAddr, cb_data: *mut ()) {
    let client = unsafe { &*(cb_data as *const RpcClientPreemptive<'static>) };
    client.on_response(payload);
}
