//! Protocol performance benchmarks
//!
//! Benchmarks for header parsing/serialization, sequence arithmetic, and
//! the RTO estimator.

use bytes::BytesMut;
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};

use rudp_protocol::{seq, Command, PacketHeader, RtoEstimator, HEADER_SIZE};
use std::time::Duration;

fn bench_header_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("header_parse");

    let header = PacketHeader {
        command: Command::App(3).to_byte().unwrap(),
        opt: rudp_protocol::opt::RELIABLE | rudp_protocol::opt::ACK,
        reliable: 42,
        unreliable: 0,
        reliable_ack: 41,
        segment_index: 0,
        segments_size: 1,
    };
    let mut buf = BytesMut::with_capacity(HEADER_SIZE);
    header.write(&mut buf);
    let encoded = buf.freeze();

    group.throughput(Throughput::Bytes(HEADER_SIZE as u64));
    group.bench_function("parse", |b| {
        b.iter(|| PacketHeader::parse(black_box(&encoded)));
    });

    group.finish();
}

fn bench_header_write(c: &mut Criterion) {
    let mut group = c.benchmark_group("header_write");

    let header = PacketHeader {
        command: Command::App(3).to_byte().unwrap(),
        opt: rudp_protocol::opt::RELIABLE,
        reliable: 42,
        unreliable: 0,
        reliable_ack: 0,
        segment_index: 0,
        segments_size: 1,
    };

    group.bench_function("write", |b| {
        b.iter(|| {
            let mut buf = BytesMut::with_capacity(HEADER_SIZE);
            black_box(&header).write(&mut buf);
            buf
        });
    });

    group.finish();
}

fn bench_seq(c: &mut Criterion) {
    let mut group = c.benchmark_group("seq");

    group.bench_function("delta", |b| {
        b.iter(|| seq::delta(black_box(42), black_box(0xFFF0)));
    });

    group.bench_function("is_next", |b| {
        b.iter(|| seq::is_next(black_box(0), black_box(0xFFFF)));
    });

    group.finish();
}

fn bench_rto(c: &mut Criterion) {
    let mut group = c.benchmark_group("rto");

    group.bench_function("sample", |b| {
        let mut est = RtoEstimator::new(Duration::from_millis(200), Duration::from_millis(1000));
        b.iter(|| est.sample(black_box(Duration::from_millis(180))));
    });

    group.bench_function("backoff", |b| {
        let mut est = RtoEstimator::new(Duration::from_millis(200), Duration::from_millis(1000));
        est.sample(Duration::from_millis(180));
        b.iter(|| est.backoff());
    });

    group.finish();
}

criterion_group!(benches, bench_header_parse, bench_header_write, bench_seq, bench_rto);
criterion_main!(benches);
