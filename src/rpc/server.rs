// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Port of esp_amp_rpc_server.c: a fixed-capacity service table behind a
// single bus endpoint. Dispatch happens inline from the bus's poll-driven
// callback rather than a dedicated server task, since the original's
// "server task" does nothing but block on the bus and call this same
// handler.

use std::cell::{Cell, RefCell, UnsafeCell};
use std::mem::MaybeUninit;

use super::packet::{self, RpcPacket, RpcStatus};
use crate::bus::{Device, Endpoint, EndpointAddr};
use crate::{AmpError, AmpResult};

/// `params_in`, `params_out` (capacity on entry, length written on success).
/// Returns the number of bytes written to `params_out`, or `Err(())` to map
/// to [`RpcStatus::ExecFailed`].
pub type ServiceHandler = fn(params_in: &[u8], params_out: &mut [u8]) -> Result<u16, ()>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerLifecycle {
    Invalid,
    Ready,
    Running,
    Stopped,
}

/// Fixed-capacity `{service_id, handler}` table. `add_service` replaces on
/// duplicate id.
pub struct ServiceTable<const S: usize> {
    slots: [Option<(u16, ServiceHandler)>; S],
}

impl<const S: usize> ServiceTable<S> {
    pub const fn new() -> Self {
        Self { slots: [None; S] }
    }

    pub fn add_service(&mut self, service_id: u16, handler: ServiceHandler) -> AmpResult<()> {
        if let Some(slot) = self.slots.iter_mut().find(|s| matches!(s, Some((id, _)) if *id == service_id)) {
            *slot = Some((service_id, handler));
            return Ok(());
        }
        match self.slots.iter_mut().find(|s| s.is_none()) {
            Some(slot) => {
                *slot = Some((service_id, handler));
                Ok(())
            }
            None => Err(AmpError::NoMem),
        }
    }

    pub fn find(&self, service_id: u16) -> Option<ServiceHandler> {
        self.slots.iter().find_map(|s| match s {
            Some((id, handler)) if *id == service_id => Some(*handler),
            _ => None,
        })
    }
}

impl<const S: usize> Default for ServiceTable<S> {
    fn default() -> Self {
        Self::new()
    }
}

/// Binds one server endpoint on `device` and dispatches inbound request
/// packets to registered services. Built with `'static` storage in mind:
/// the dispatch callback receives `self` as a raw pointer, so `start` takes
/// `&'static self`.
pub struct RpcServer<'a, const S: usize> {
    device: &'a Device<'a>,
    client_addr: EndpointAddr,
    server_addr: EndpointAddr,
    services: RefCell<ServiceTable<S>>,
    state: Cell<ServerLifecycle>,
    endpoint: UnsafeCell<MaybeUninit<Endpoint>>,
}

unsafe impl<'a, const S: usize> Sync for RpcServer<'a, S> {}

impl<'a, const S: usize> RpcServer<'a, S> {
    pub fn new(device: &'a Device<'a>, client_addr: EndpointAddr, server_addr: EndpointAddr) -> Self {
        Self {
            device,
            client_addr,
            server_addr,
            services: RefCell::new(ServiceTable::new()),
            state: Cell::new(ServerLifecycle::Ready),
            endpoint: UnsafeCell::new(MaybeUninit::uninit()),
        }
    }

    pub fn state(&self) -> ServerLifecycle {
        self.state.get()
    }

    /// Rejects on a null handler by construction (the type system requires
    /// a real `fn`); replaces on duplicate id; fails with
    /// [`AmpError::NoMem`] when the table is full.
    pub fn add_service(&self, service_id: u16, handler: ServiceHandler) -> AmpResult<()> {
        self.services.borrow_mut().add_service(service_id, handler)
    }

    /// Ready/Stopped → Running. Registers the dispatch endpoint. A server
    /// is `Ready` as soon as it's constructed; `Invalid` is reserved for a
    /// server whose construction was aborted partway and never reaches
    /// `start`.
    pub fn start(&'static self) -> AmpResult<()> {
        if !matches!(self.state.get(), ServerLifecycle::Ready | ServerLifecycle::Stopped) {
            return Err(AmpError::NotAllowed);
        }
        let storage = self.endpoint.get() as *mut Endpoint;
        self.device.create_endpoint(self.server_addr, Some(dispatch::<S>), self as *const Self as *mut (), storage)?;
        self.state.set(ServerLifecycle::Running);
        Ok(())
    }

    /// Running → Stopped. Idempotent.
    pub fn stop(&self) -> AmpResult<()> {
        if self.state.get() != ServerLifecycle::Running {
            return Ok(());
        }
        self.device.delete_endpoint(self.server_addr);
        self.state.set(ServerLifecycle::Stopped);
        Ok(())
    }

    fn on_request(&self, payload: &[u8]) {
        let inbound_ptr = payload.as_ptr() as *mut u8;

        let hdr = match unsafe { RpcPacket::read(payload.as_ptr(), payload.len()) } {
            Some(hdr) => hdr,
            None => {
                let _ = self.device.destroy(inbound_ptr);
                return;
            }
        };

        let max_payload = self.device.max_payload();
        let out_cap = max_payload as usize - packet::HEADER_SIZE;
        let out_buf = match self.device.create_msg(max_payload) {
            Ok(buf) => buf,
            Err(_) => {
                let _ = self.device.destroy(inbound_ptr);
                return;
            }
        };

        let params_in = unsafe { std::slice::from_raw_parts(RpcPacket::params(payload.as_ptr()), hdr.params_len as usize) };
        let params_out = unsafe { std::slice::from_raw_parts_mut(RpcPacket::params_mut(out_buf), out_cap) };

        let (status, out_len) = match self.services.borrow().find(hdr.service_id) {
            None => (RpcStatus::NoService, 0u16),
            Some(handler) => match handler(params_in, params_out) {
                Ok(n) => (RpcStatus::Ok, n),
                Err(()) => (RpcStatus::ExecFailed, 0u16),
            },
        };

        unsafe { RpcPacket::write(out_buf, hdr.req_id, hdr.service_id, status, out_len) };
        let total_len = packet::HEADER_SIZE as u16 + out_len;
        let _ = self.device.send_nocopy(out_buf, self.server_addr, self.client_addr, total_len);
        let _ = self.device.destroy(inbound_ptr);
    }
}

fn dispatch<const S: usize>(payload: &[u8], _src_addr: EndpointAddr, cb_data: *mut ()) {
    let server = unsafe { &*(cb_data as *const RpcServer<'static, S>) };
    server.on_request(payload);
}
