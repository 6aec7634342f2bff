// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Port of esp_amp_rpmsg.c — a device binds a TX queue, an RX queue, and a
// linked list of endpoints, and multiplexes many logical addresses over
// that one queue pair. Grounded structurally on the endpoint-table /
// dispatch idiom of channel.rs's `ChanInner`, rewritten around the
// flip-counter descriptor queue instead of a connection-bitmask ring.

mod endpoint;
mod message;

pub use endpoint::{Endpoint, EndpointAddr, RxCallback};
pub use message::{MessageHeader, HEADER_SIZE};

use crate::signal::HwSignalLine;
use crate::shared_info::SysInfoId;
use crate::sync::CriticalSection;
use crate::{AmpError, AmpResult, Queue, QueueConfig, QueueRole, SharedInfoRegistry};

/// `{queue_size, max_queue_item_size, queue_buffer, queue_desc}` — section 6's
/// queue configuration entry, with pointers replaced by region offsets.
#[repr(C)]
struct QueueWireConfig {
    config: QueueConfig,
    queue_buffer_offset: u32,
    queue_desc_offset: u32,
}

/// A multiplexed endpoint table on top of one queue pair.
///
/// Endpoint-table mutations (`create_endpoint` / `delete_endpoint` /
/// `rebind_endpoint`) and the task-context send paths are serialized by
/// `cs`; the `_from_isr` paths are not, per the documented "don't run both
/// concurrently without taking the critical section yourself" contract.
pub struct Device<'a> {
    tx: Queue,
    rx: Queue,
    head: std::cell::Cell<*mut Endpoint>,
    cs: &'a dyn CriticalSection,
}

unsafe impl<'a> Send for Device<'a> {}
unsafe impl<'a> Sync for Device<'a> {}

impl<'a> Device<'a> {
    pub(crate) fn new(tx: Queue, rx: Queue, cs: &'a dyn CriticalSection) -> Self {
        Self { tx, rx, head: std::cell::Cell::new(std::ptr::null_mut()), cs }
    }

    /// Largest payload a single message can carry on this device.
    pub fn max_payload(&self) -> u16 {
        self.tx.max_item_size() - HEADER_SIZE as u16
    }

    // --- endpoint table -----------------------------------------------

    /// Insert `storage` at the head of the endpoint list under `addr`.
    /// Fails with [`AmpError::NotAllowed`] on a duplicate address or null
    /// storage.
    pub fn create_endpoint(
        &self,
        addr: EndpointAddr,
        rx_cb: Option<RxCallback>,
        rx_cb_data: *mut (),
        storage: *mut Endpoint,
    ) -> AmpResult<*mut Endpoint> {
        if storage.is_null() {
            return Err(AmpError::NotAllowed);
        }
        self.cs.enter();
        let found = self.search_endpoint_locked(addr);
        let result = if found.is_some() {
            Err(AmpError::NotAllowed)
        } else {
            unsafe {
                (*storage).addr = addr;
                (*storage).rx_cb = rx_cb;
                (*storage).rx_cb_data = rx_cb_data;
                (*storage).next = self.head.get();
            }
            self.head.set(storage);
            Ok(storage)
        };
        self.cs.leave();
        result
    }

    /// Unlink and return the endpoint registered at `addr`, if any.
    pub fn delete_endpoint(&self, addr: EndpointAddr) -> Option<*mut Endpoint> {
        self.cs.enter();
        let mut prev: *mut Endpoint = std::ptr::null_mut();
        let mut cur = self.head.get();
        while !cur.is_null() {
            let next = unsafe { (*cur).next };
            if unsafe { (*cur).addr } == addr {
                if prev.is_null() {
                    self.head.set(next);
                } else {
                    unsafe { (*prev).next = next };
                }
                self.cs.leave();
                return Some(cur);
            }
            prev = cur;
            cur = next;
        }
        self.cs.leave();
        None
    }

    /// Atomically replace the callback fields of the endpoint at `addr`.
    pub fn rebind_endpoint(&self, addr: EndpointAddr, rx_cb: Option<RxCallback>, rx_cb_data: *mut ()) -> bool {
        self.cs.enter();
        let found = self.search_endpoint_locked(addr);
        if let Some(ep) = found {
            unsafe {
                (*ep).rx_cb = rx_cb;
                (*ep).rx_cb_data = rx_cb_data;
            }
        }
        self.cs.leave();
        found.is_some()
    }

    /// O(list length) lookup.
    pub fn search_endpoint(&self, addr: EndpointAddr) -> Option<*mut Endpoint> {
        self.cs.enter();
        let found = self.search_endpoint_locked(addr);
        self.cs.leave();
        found
    }

    fn search_endpoint_locked(&self, addr: EndpointAddr) -> Option<*mut Endpoint> {
        let mut cur = self.head.get();
        while !cur.is_null() {
            if unsafe { (*cur).addr } == addr {
                return Some(cur);
            }
            cur = unsafe { (*cur).next };
        }
        None
    }

    // --- send paths -----------------------------------------------------

    /// Allocate a slot's payload area for `len` bytes under the critical
    /// section. The returned pointer becomes invalid once `send_nocopy`
    /// returns (success or failure).
    pub fn create_msg(&self, len: u16) -> AmpResult<*mut u8> {
        self.cs.enter();
        let r = self.tx.alloc(HEADER_SIZE as u16 + len);
        self.cs.leave();
        r.map(|slot| unsafe { MessageHeader::payload_mut(slot) })
    }

    /// Same as [`create_msg`](Self::create_msg), without the critical
    /// section: the caller guarantees this does not overlap a task-context
    /// call into the same queue.
    pub fn create_msg_from_isr(&self, len: u16) -> AmpResult<*mut u8> {
        self.tx.alloc(HEADER_SIZE as u16 + len).map(|slot| unsafe { MessageHeader::payload_mut(slot) })
    }

    fn slot_of(payload: *mut u8) -> *mut u8 {
        unsafe { payload.sub(HEADER_SIZE) }
    }

    /// Submit a buffer obtained from `create_msg`. On failure the caller
    /// never gains ownership of the slot and must not retain `payload`.
    pub fn send_nocopy(&self, payload: *mut u8, src_addr: EndpointAddr, dst_addr: EndpointAddr, len: u16) -> AmpResult<()> {
        let slot = Self::slot_of(payload);
        unsafe { MessageHeader::write(slot, src_addr, dst_addr, len) };
        self.cs.enter();
        let r = self.tx.send(slot, HEADER_SIZE as u16 + len);
        self.cs.leave();
        r
    }

    pub fn send_nocopy_from_isr(&self, payload: *mut u8, src_addr: EndpointAddr, dst_addr: EndpointAddr, len: u16) -> AmpResult<()> {
        let slot = Self::slot_of(payload);
        unsafe { MessageHeader::write(slot, src_addr, dst_addr, len) };
        self.tx.send(slot, HEADER_SIZE as u16 + len)
    }

    /// Allocate, copy `data` in, and send.
    pub fn send(&self, src_addr: EndpointAddr, dst_addr: EndpointAddr, data: &[u8]) -> AmpResult<()> {
        let buf = self.create_msg(data.len() as u16)?;
        unsafe { std::ptr::copy_nonoverlapping(data.as_ptr(), buf, data.len()) };
        self.send_nocopy(buf, src_addr, dst_addr, data.len() as u16)
    }

    pub fn send_from_isr(&self, src_addr: EndpointAddr, dst_addr: EndpointAddr, data: &[u8]) -> AmpResult<()> {
        let buf = self.create_msg_from_isr(data.len() as u16)?;
        unsafe { std::ptr::copy_nonoverlapping(data.as_ptr(), buf, data.len()) };
        self.send_nocopy_from_isr(buf, src_addr, dst_addr, data.len() as u16)
    }

    // --- receive / destroy -----------------------------------------------

    /// Receive and dispatch one message. Returns `0` if a message was
    /// processed (poll again), `-1` if none was available.
    pub fn poll(&self) -> i32 {
        let (slot, len) = match self.rx.recv() {
            Ok(v) => v,
            Err(_) => return -1,
        };
        let hdr = unsafe { MessageHeader::read(slot) };
        debug_assert_eq!(hdr.data_len, len - HEADER_SIZE as u16);
        match self.search_endpoint(hdr.dst_addr) {
            Some(ep) => match unsafe { (*ep).rx_cb } {
                Some(cb) => {
                    let payload = unsafe {
                        std::slice::from_raw_parts(MessageHeader::payload(slot), hdr.data_len as usize)
                    };
                    cb(payload, hdr.src_addr, unsafe { (*ep).rx_cb_data });
                }
                None => {
                    let _ = self.rx.free(slot);
                }
            },
            None => {
                let _ = self.rx.free(slot);
            }
        }
        0
    }

    /// Release a payload previously handed to an endpoint's callback. Must
    /// be called exactly once, by the receiver side only; double-destroy or
    /// destroying a sender-allocated buffer leaks a slot permanently.
    pub fn destroy(&self, payload: *mut u8) -> AmpResult<()> {
        self.rx.free(Self::slot_of(payload))
    }
}

/// Register a Signal handler on `intr_id` that drains `dev.poll()` until it
/// returns `-1`. Port of `esp_amp_rpmsg_intr_enable`.
pub fn intr_enable<L: HwSignalLine>(
    dev: &'static Device<'static>,
    signal: &crate::signal::CrossCoreSignal<L>,
    intr_id: u8,
) -> AmpResult<()> {
    fn drain(_bit: u8, arg: *mut ()) {
        let dev = unsafe { &*(arg as *const Device<'static>) };
        while dev.poll() == 0 {}
    }
    signal.add_handler(intr_id, drain, dev as *const Device<'static> as *mut ())
}

/// Allocate queue configs and a shared buffer slab for both directions and
/// bind the main core's TX/RX handles. Port of `esp_amp_rpmsg_main_init` /
/// `__esp_amp_queue_main_init`.
pub fn main_init<'a>(
    registry: &SharedInfoRegistry,
    queue_size: u16,
    item_size: u16,
    cs: &'a dyn CriticalSection,
    tx_notify: Box<dyn Fn() + Send + Sync>,
) -> AmpResult<Device<'a>> {
    let slab_size = 2u32 * queue_size as u32 * item_size as u32;
    assert!(slab_size <= u16::MAX as u32, "slab too large for a 16-bit sys-info size field");
    let slab_ptr = registry.allocate(SysInfoId::VqueueBuffer.id(), slab_size as u16)?;
    let slab_offset = registry.offset_of(slab_ptr);

    let tx_cfg_ptr = alloc_queue_config(registry, SysInfoId::VqueueTx.id(), queue_size, item_size, slab_offset)?;
    let rx_cfg_ptr = alloc_queue_config(
        registry,
        SysInfoId::VqueueRx.id(),
        queue_size,
        item_size,
        slab_offset + queue_size as u32 * item_size as u32,
    )?;

    let tx = bind_queue(registry, tx_cfg_ptr, QueueRole::Master, Some(tx_notify));
    let rx = bind_queue(registry, rx_cfg_ptr, QueueRole::Remote, None);
    Ok(Device::new(tx, rx, cs))
}

/// Resolve the main core's queue config keys with roles crossed (main TX is
/// the sub's RX and vice versa) and bind the subcore's handles. Port of
/// `esp_amp_rpmsg_sub_init` / `__esp_amp_queue_sub_init`.
pub fn sub_init<'a>(
    registry: &SharedInfoRegistry,
    cs: &'a dyn CriticalSection,
    tx_notify: Box<dyn Fn() + Send + Sync>,
) -> AmpResult<Device<'a>> {
    let main_tx_ptr = registry.get(SysInfoId::VqueueTx.id()).ok_or(AmpError::NotFound)?;
    let main_rx_ptr = registry.get(SysInfoId::VqueueRx.id()).ok_or(AmpError::NotFound)?;

    // Sub's RX is main's TX; sub's TX is main's RX.
    let rx = bind_queue(registry, main_tx_ptr as *mut QueueWireConfig, QueueRole::Remote, None);
    let tx = bind_queue(registry, main_rx_ptr as *mut QueueWireConfig, QueueRole::Master, Some(tx_notify));
    Ok(Device::new(tx, rx, cs))
}

fn alloc_queue_config(
    registry: &SharedInfoRegistry,
    info_id: u16,
    queue_size: u16,
    item_size: u16,
    slab_offset: u32,
) -> AmpResult<*mut QueueWireConfig> {
    let desc_bytes = queue_size as usize * std::mem::size_of::<crate::queue::Descriptor>();
    let entry_size = std::mem::size_of::<QueueWireConfig>() + desc_bytes;
    assert!(entry_size <= u16::MAX as usize, "queue config too large for a 16-bit sys-info size field");
    let ptr = registry.allocate(info_id, entry_size as u16)? as *mut QueueWireConfig;
    let desc_offset = registry.offset_of(ptr as *mut u8) + std::mem::size_of::<QueueWireConfig>() as u32;
    unsafe {
        (*ptr).config = QueueConfig { size: queue_size, max_item_size: item_size };
        (*ptr).queue_buffer_offset = slab_offset;
        (*ptr).queue_desc_offset = desc_offset;
    }
    let descs = registry.ptr_at(desc_offset) as *mut crate::queue::Descriptor;
    crate::queue::init_buffer(descs, queue_size, item_size);
    Ok(ptr)
}

fn bind_queue(
    registry: &SharedInfoRegistry,
    cfg_ptr: *mut QueueWireConfig,
    role: QueueRole,
    notify: Option<Box<dyn Fn() + Send + Sync>>,
) -> Queue {
    let (config, buffer_offset, desc_offset) =
        unsafe { ((*cfg_ptr).config, (*cfg_ptr).queue_buffer_offset, (*cfg_ptr).queue_desc_offset) };
    let descs = registry.ptr_at(desc_offset) as *mut crate::queue::Descriptor;
    let slab = registry.ptr_at(buffer_offset);
    unsafe { Queue::from_raw(descs, slab, config.size, config.max_item_size, role, notify) }
}
