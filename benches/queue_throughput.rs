// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Descriptor queue and bus throughput benchmarks.
//
// Run with:
//   cargo bench --bench queue_throughput
//
// Groups:
//   queue_round_trip — alloc/send/recv/free at three item sizes
//   bus_send         — copy-in send through a two-endpoint device pair,
//                      wired up through the same main_init/sub_init path
//                      the real stack uses

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use amp_ipc::bus::{self, Endpoint, EndpointAddr};
use amp_ipc::queue::{init_buffer, Descriptor, Queue, QueueRole};
use amp_ipc::shared_info::SharedInfoRegistry;
use amp_ipc::sync::SpinCriticalSection;

const SIZES: &[(&str, u16)] = &[("small_64", 64), ("medium_256", 256), ("large_1024", 1024)];
const RING_SIZE: u16 = 16;

fn zeroed_descriptors(n: u16) -> Vec<Descriptor> {
    (0..n).map(|_| unsafe { std::mem::zeroed() }).collect()
}

fn make_queue_pair(item_size: u16) -> (Queue, Queue, Vec<Descriptor>, Vec<u8>) {
    let mut descs = zeroed_descriptors(RING_SIZE);
    let mut slab = vec![0u8; RING_SIZE as usize * item_size as usize];
    init_buffer(descs.as_mut_ptr(), RING_SIZE, item_size);
    let master = unsafe {
        Queue::from_raw(descs.as_mut_ptr(), slab.as_mut_ptr(), RING_SIZE, item_size, QueueRole::Master, None)
    };
    let remote = unsafe {
        Queue::from_raw(descs.as_mut_ptr(), slab.as_mut_ptr(), RING_SIZE, item_size, QueueRole::Remote, None)
    };
    (master, remote, descs, slab)
}

fn bench_queue_round_trip(c: &mut Criterion) {
    let mut group = c.benchmark_group("queue_round_trip");

    for &(label, item_size) in SIZES {
        let (master, remote, _descs, _slab) = make_queue_pair(item_size);
        let payload = vec![0xABu8; item_size as usize];
        group.throughput(Throughput::Bytes(item_size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(label), &item_size, |b, &sz| {
            b.iter(|| {
                let buf = master.alloc(sz).unwrap();
                unsafe { std::ptr::copy_nonoverlapping(payload.as_ptr(), buf, sz as usize) };
                master.send(buf, sz).unwrap();
                let (rbuf, rlen) = remote.recv().unwrap();
                black_box(unsafe { std::slice::from_raw_parts(rbuf, rlen as usize) });
                remote.free(rbuf).unwrap();
            });
        });
    }

    group.finish();
}

fn bench_bus_send(c: &mut Criterion) {
    let mut group = c.benchmark_group("bus_send");

    let region: &'static mut [u8] = Box::leak(vec![0u8; 1 << 16].into_boxed_slice());
    let registry = Box::leak(Box::new(unsafe { SharedInfoRegistry::from_raw(region.as_mut_ptr(), region.len()) }));
    registry.init();

    let cs_main: &'static SpinCriticalSection = Box::leak(Box::new(SpinCriticalSection::new()));
    let cs_sub: &'static SpinCriticalSection = Box::leak(Box::new(SpinCriticalSection::new()));

    let main_dev = Box::leak(Box::new(
        bus::main_init(registry, RING_SIZE, 256, cs_main, Box::new(|| {})).unwrap(),
    ));
    let sub_dev = Box::leak(Box::new(bus::sub_init(registry, cs_sub, Box::new(|| {})).unwrap()));

    const RECV: EndpointAddr = 1;
    fn on_recv(_payload: &[u8], _src: EndpointAddr, _cb_data: *mut ()) {}

    let ep: &'static mut std::mem::MaybeUninit<Endpoint> = Box::leak(Box::new(std::mem::MaybeUninit::uninit()));
    sub_dev.create_endpoint(RECV, Some(on_recv), std::ptr::null_mut(), ep.as_mut_ptr()).unwrap();

    let payload = vec![0xCDu8; 200];
    group.throughput(Throughput::Bytes(payload.len() as u64));
    group.bench_function("copy_in_send_and_poll", |b| {
        b.iter(|| {
            main_dev.send(0, RECV, &payload).unwrap();
            black_box(sub_dev.poll());
        });
    });

    group.finish();
}

criterion_group!(benches, bench_queue_round_trip, bench_bus_send);
criterion_main!(benches);
