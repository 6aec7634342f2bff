// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Port of the endpoint list in esp_amp_rpmsg.c: a per-device singly linked
// list of `{addr, rx_cb, rx_cb_data, next}` nodes. Endpoints refer back to
// their device through the dispatcher's argument, not a stored pointer, so
// there's no ownership cycle to untangle (see Design Notes).

pub type EndpointAddr = u16;

/// Callback invoked for every inbound message addressed to this endpoint.
/// `cb_data` is the opaque context pointer given to `create_endpoint`.
pub type RxCallback = fn(payload: &[u8], src_addr: EndpointAddr, cb_data: *mut ());

/// A node in a device's endpoint list. Callers supply the storage (no
/// allocation here), matching the bare-metal original where endpoints are
/// statically allocated.
pub struct Endpoint {
    pub(crate) addr: EndpointAddr,
    pub(crate) rx_cb: Option<RxCallback>,
    pub(crate) rx_cb_data: *mut (),
    pub(crate) next: *mut Endpoint,
}

unsafe impl Send for Endpoint {}

impl Endpoint {
    pub fn addr(&self) -> EndpointAddr {
        self.addr
    }
}
