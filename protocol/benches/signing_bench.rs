// Signing, recovery and address benchmarks for trxsafe.
//
// Covers secp256k1 keypair generation, RFC 6979 signing with the recovery
// id search, public-key recovery, address derivation, and a full transfer
// through validate-then-sign at several batch sizes.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use trxsafe_protocol::codec::address::Address;
use trxsafe_protocol::crypto::hash::sha256;
use trxsafe_protocol::crypto::keys::TronKeypair;
use trxsafe_protocol::crypto::signatures::{recover_address, sign_digest};
use trxsafe_protocol::transaction::builder::{assemble_transfer, Tapos};
use trxsafe_protocol::transaction::signing::sign_transaction;

const SELLER: &str = "TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t";

fn tapos() -> Tapos {
    Tapos::synthetic(1_700_000_000_000)
}

fn bench_keypair_generation(c: &mut Criterion) {
    c.bench_function("secp256k1/keypair_generate", |b| {
        b.iter(TronKeypair::generate);
    });
}

fn bench_sign_digest(c: &mut Criterion) {
    let keypair = TronKeypair::generate();
    let digest = sha256(b"pay 15 TRX to the shop");

    c.bench_function("secp256k1/sign_digest", |b| {
        b.iter(|| sign_digest(&keypair, &digest).unwrap());
    });
}

fn bench_recover(c: &mut Criterion) {
    let keypair = TronKeypair::generate();
    let digest = sha256(b"pay 15 TRX to the shop");
    let signature = sign_digest(&keypair, &digest).unwrap();

    c.bench_function("secp256k1/recover_address", |b| {
        b.iter(|| recover_address(&digest, &signature).unwrap());
    });
}

fn bench_address_derivation(c: &mut Criterion) {
    let public_key = TronKeypair::generate().public_key();
    let address = Address::from_public_key(&public_key).encode();

    c.bench_function("address/from_public_key", |b| {
        b.iter(|| Address::from_public_key(&public_key));
    });
    c.bench_function("address/decode_base58check", |b| {
        b.iter(|| Address::decode(&address).unwrap());
    });
}

fn bench_sign_transfers(c: &mut Criterion) {
    let mut group = c.benchmark_group("transfer/validate_and_sign");
    let seller: Address = SELLER.parse().unwrap();

    for size in [1, 10, 50] {
        let items: Vec<_> = (0..size)
            .map(|i| {
                let kp = TronKeypair::generate();
                let tx = assemble_transfer(&kp.address(), &seller, 1_000_000 + i, &tapos()).unwrap();
                (kp, tx)
            })
            .collect();

        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &items, |b, items| {
            b.iter(|| {
                for (kp, tx) in items {
                    sign_transaction(tx, kp).unwrap();
                }
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_keypair_generation,
    bench_sign_digest,
    bench_recover,
    bench_address_derivation,
    bench_sign_transfers,
);
criterion_main!(benches);
