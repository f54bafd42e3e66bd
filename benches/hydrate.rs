//! This bench test resolves and re-projects the references of a large
//! synthetic document: organisations, roles and contacts that reference
//! them, and transmitters grouped into RF systems.

#![allow(missing_docs)]

use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use ssrf::{Dataset, Document, EntityKind, SerialKey};

const SIZE: usize = 2_000;

fn serial(kind: &str, i: usize) -> SerialKey {
    SerialKey::new("USA", "AF", kind, i.to_string()).unwrap()
}

/// Generates a document in which every dataset references others, with one
/// dangling serial per hundred contacts.
fn preseed_document() -> Document {
    let mut document = Document::with_capacity(SIZE * 5);
    for i in 1..=SIZE {
        document.push(Dataset::new(EntityKind::Organisation).with_serial(serial("OR", i)));
        document.push(
            Dataset::new(EntityKind::Role)
                .with_serial(serial("RL", i))
                .with_reference("OrganisationRef", serial("OR", i))
                .unwrap(),
        );

        let organisation = if i % 100 == 0 { SIZE + i } else { i };
        document.push(
            Dataset::new(EntityKind::Contact)
                .with_serial(serial("CT", i))
                .with_reference("OrganisationRef", serial("OR", organisation))
                .unwrap()
                .with_reference("RoleRef", serial("RL", i))
                .unwrap(),
        );
        document.push(Dataset::new(EntityKind::Transmitter).with_serial(serial("TX", i)));
        document.push(
            Dataset::new(EntityKind::RfSystem)
                .with_serial(serial("RS", i))
                .with_reference("TxRef", serial("TX", i))
                .unwrap()
                .with_reference("TxRef", serial("TX", SIZE + 1 - i))
                .unwrap(),
        );
    }
    document
}

fn hydrate(c: &mut Criterion) {
    let document = preseed_document();

    c.bench_function("hydrate", |b| {
        b.iter_batched(
            || document.clone(),
            |mut document| document.hydrate().unwrap(),
            BatchSize::LargeInput,
        );
    });

    let mut hydrated = document;
    hydrated.hydrate().unwrap();

    c.bench_function("materialize", |b| {
        b.iter_batched(
            || hydrated.clone(),
            |mut document| document.materialize().unwrap(),
            BatchSize::LargeInput,
        );
    });
}

criterion_group!(benches, hydrate);
criterion_main!(benches);
