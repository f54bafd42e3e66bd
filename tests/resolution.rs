//! End-to-end reference resolution over the public API.

use ssrf::{
    Dataset, Document, DocumentFile, DocumentState, DuplicateKeyError, EntityKind, Registry,
    SerialKey, domain::resolver,
};
use tempfile::TempDir;

fn serial(s: &str) -> SerialKey {
    s.parse().unwrap()
}

/// Every resolved field, as serials, in document order.
fn resolved_serials(document: &Document) -> Vec<(String, &'static str, Vec<String>)> {
    document
        .iter()
        .flat_map(|(_, dataset)| {
            let source = dataset.serial().map(ToString::to_string).unwrap_or_default();
            dataset.reference_fields().map(move |(relation, field)| {
                let targets = field
                    .resolved()
                    .iter()
                    .map(|&id| {
                        document
                            .get(id)
                            .and_then(Dataset::serial)
                            .map(ToString::to_string)
                            .unwrap_or_default()
                    })
                    .collect();
                (source.clone(), relation.name, targets)
            })
        })
        .collect()
}

fn network() -> Document {
    let mut document = Document::new();
    document.push(
        Dataset::new(EntityKind::Organisation)
            .with_serial(serial("USA:AF:OR:1"))
            .with_title("Air Force"),
    );
    document.push(
        Dataset::new(EntityKind::Organisation)
            .with_serial(serial("USA:AF:OR:2"))
            .with_reference("ParentRef", serial("USA:AF:OR:1"))
            .unwrap(),
    );
    document.push(
        Dataset::new(EntityKind::Role)
            .with_serial(serial("USA:AF:RL:1"))
            .with_reference("OrganisationRef", serial("USA:AF:OR:2"))
            .unwrap(),
    );
    document.push(
        Dataset::new(EntityKind::Contact)
            .with_serial(serial("USA:AF:CT:1"))
            .with_reference("OrganisationRef", serial("USA:AF:OR:2"))
            .unwrap()
            .with_reference("RoleRef", serial("USA:AF:RL:1"))
            .unwrap()
            .with_reference("RoleRef", serial("USA:AF:RL:9"))
            .unwrap(),
    );
    document.push(Dataset::new(EntityKind::Transmitter).with_serial(serial("USA:AF:TX:1")));
    document.push(
        Dataset::new(EntityKind::RfSystem)
            .with_serial(serial("USA:AF:RS:1"))
            .with_reference("TxRef", serial("USA:AF:TX:1"))
            .unwrap()
            .with_reference("TxRef", serial("USA:AF:TX:1"))
            .unwrap(),
    );
    document
}

#[test]
fn canonical_serials_round_trip() {
    for text in ["USA:AF:OR:100", "DEU::CP:1", "GBR:RAF:TX:A-7"] {
        assert_eq!(serial(text).to_string(), text);
    }
}

#[test]
fn rehydrating_a_materialized_document_is_stable() {
    let mut document = network();
    let first = document.hydrate().unwrap();
    let before = resolved_serials(&document);

    document.materialize().unwrap();
    let second = document.hydrate().unwrap();

    assert_eq!(resolved_serials(&document), before);
    assert_eq!(second.resolved, first.resolved);
    // The dangling role was dropped by materialize.
    assert_eq!(first.dangling.len(), 1);
    assert!(second.dangling.is_empty());
}

#[test]
fn dangling_serials_are_skipped() {
    let mut document = network();
    let report = document.hydrate().unwrap();

    let contact = document
        .find(EntityKind::Contact, &serial("USA:AF:CT:1"))
        .unwrap();
    let role = document.find(EntityKind::Role, &serial("USA:AF:RL:1")).unwrap();

    assert_eq!(
        document.get(contact).unwrap().resolved("RoleRef").unwrap(),
        &[role]
    );
    assert_eq!(report.dangling.len(), 1);
    assert_eq!(report.dangling[0].serial, serial("USA:AF:RL:9"));
    assert_eq!(report.dangling[0].relation, "RoleRef");
    assert_eq!(report.dangling[0].index, 1);
}

#[test]
fn duplicate_serials_fail_registry_construction() {
    let mut document = network();
    document.push(Dataset::new(EntityKind::Organisation).with_serial(serial("USA:AF:OR:1")));

    let err: DuplicateKeyError = Registry::build(&document).unwrap_err();
    assert_eq!(err.kind, EntityKind::Organisation);
    assert_eq!(err.serial, serial("USA:AF:OR:1"));
    assert!(document.hydrate().is_err());
}

#[test]
fn materialize_projects_new_relationships() {
    let mut document = Document::new();
    let organisation = document
        .push(Dataset::new(EntityKind::Organisation).with_serial(serial("USA:AF:OR:100")));
    let role = document.push(
        Dataset::new(EntityKind::Role)
            .with_resolved("OrganisationRef", organisation)
            .unwrap(),
    );

    document.materialize().unwrap();

    assert_eq!(document.state(), DocumentState::Materialized);
    assert_eq!(
        document.get(role).unwrap().references("OrganisationRef").unwrap(),
        &[serial("USA:AF:OR:100")]
    );
}

#[test]
fn toa_resolves_only_present_channel_plans() {
    let mut document = Document::new();
    let plan = document
        .push(Dataset::new(EntityKind::ChannelPlan).with_serial(serial("DEU:NFA:CP:1")));
    let toa = document.push(
        Dataset::new(EntityKind::Toa)
            .with_reference("ChannelPlanRef", serial("DEU:NFA:CP:1"))
            .unwrap()
            .with_reference("ChannelPlanRef", serial("DEU:NFA:CP:2"))
            .unwrap(),
    );

    document.hydrate().unwrap();

    let toa = document.get(toa).unwrap();
    assert_eq!(toa.resolved("ChannelPlanRef").unwrap(), &[plan]);
    assert_eq!(toa.references("ChannelPlanRef").unwrap().len(), 2);
}

#[test]
fn appending_after_hydrate_waits_for_next_hydrate() {
    let mut document = Document::new();
    let toa = document.push(
        Dataset::new(EntityKind::Toa)
            .with_reference("ChannelPlanRef", serial("DEU:NFA:CP:1"))
            .unwrap(),
    );
    document.hydrate().unwrap();
    assert!(document.get(toa).unwrap().resolved("ChannelPlanRef").unwrap().is_empty());

    let plan = document
        .push(Dataset::new(EntityKind::ChannelPlan).with_serial(serial("DEU:NFA:CP:1")));

    assert!(document.is_stale());
    assert!(document.get(toa).unwrap().resolved("ChannelPlanRef").unwrap().is_empty());

    document.hydrate().unwrap();
    assert!(!document.is_stale());
    assert_eq!(
        document.get(toa).unwrap().resolved("ChannelPlanRef").unwrap(),
        &[plan]
    );
}

#[test]
fn registry_can_be_injected() {
    let mut document = network();
    let registry = Registry::build(&document).unwrap();

    let report = resolver::hydrate(&mut document, &registry, |_| {});

    assert_eq!(report.datasets, 6);
    assert_eq!(report.resolved, 6);
}

#[test]
fn normalized_file_round_trips() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("network.yaml");

    let mut document = network();
    document.hydrate().unwrap();
    document.materialize().unwrap();
    DocumentFile::save(&document, &path).unwrap();

    let mut loaded = DocumentFile::load(&path, &ssrf::Config::default()).unwrap();
    assert_eq!(loaded.state(), DocumentState::Building);
    let report = loaded.hydrate().unwrap();

    assert!(report.dangling.is_empty());
    assert_eq!(resolved_serials(&loaded), resolved_serials(&document));
}
