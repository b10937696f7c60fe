//! Contract Test: Changeset Diffing
//!
//! This test verifies the properties every plan must have, independent of
//! the provider it is applied to.
//!
//! Constraints verified:
//! - Additions/removals are exactly the unmatched records of each side
//! - unchanged, additions, removals and updates never overlap
//! - Diffing a set against itself yields an empty changeset
//! - Same-key groups pair positionally after sorting, reproducibly
//!
//! If this test fails, plans are wrong or not reproducible.

mod common;

use common::*;
use std::collections::HashSet;
use std::sync::Arc;
use zonesync_core::changeset::{Change, Changeset, diff};
use zonesync_core::record::Record;

fn changeset(current: Vec<Record>, desired: Vec<Record>) -> Changeset {
    Changeset::new(
        current,
        desired,
        "example.com.",
        Arc::new(ScriptedProvider::new("scripted")),
    )
}

#[test]
fn disjoint_sets_become_additions_and_removals() {
    let current = vec![a("old.example.com.", "10.0.0.1", 60), txt("example.com.", "v=old")];
    let desired = vec![a("new.example.com.", "10.0.0.2", 60), txt("www.example.com.", "v=new")];

    let changeset = changeset(current.clone(), desired.clone());

    let added: HashSet<&Record> = changeset.additions().iter().map(Change::record).collect();
    let removed: HashSet<&Record> = changeset.removals().iter().map(Change::record).collect();
    assert_eq!(added, desired.iter().collect::<HashSet<_>>());
    assert_eq!(removed, current.iter().collect::<HashSet<_>>());
    assert!(changeset.updates().is_empty());
}

#[test]
fn categories_partition_the_records() {
    let current = vec![
        a("www.example.com.", "10.0.0.1", 60),
        a("www.example.com.", "10.0.0.2", 60),
        a("api.example.com.", "10.0.1.1", 60),
        cname("docs.example.com.", "docs.example.net.", 300),
    ];
    let desired = vec![
        a("www.example.com.", "10.0.0.1", 60),
        a("www.example.com.", "10.0.0.3", 60),
        cname("docs.example.com.", "docs.example.org.", 300),
        txt("example.com.", "hello"),
    ];

    let changeset = changeset(current.clone(), desired.clone());

    let mut seen_current = HashSet::new();
    let mut seen_desired = HashSet::new();
    for record in changeset.unchanged() {
        assert!(seen_current.insert(record.clone()));
        assert!(seen_desired.insert(record.clone()));
    }
    for change in changeset.changes() {
        if let Some(before) = change.before() {
            assert!(seen_current.insert(before.clone()), "{} counted twice", before);
        }
        if let Some(after) = change.after() {
            assert!(seen_desired.insert(after.clone()), "{} counted twice", after);
        }
    }

    assert_eq!(seen_current, current.into_iter().collect::<HashSet<_>>());
    assert_eq!(seen_desired, desired.into_iter().collect::<HashSet<_>>());
}

#[test]
fn a_set_diffed_against_itself_is_empty() {
    let records = vec![
        a("www.example.com.", "10.0.0.1", 60),
        a("www.example.com.", "10.0.0.2", 60),
        txt("example.com.", "v=spf1 -all"),
    ];

    let changeset = changeset(records.clone(), records.clone());
    assert!(changeset.is_empty());
    assert_eq!(changeset.changes().count(), 0);
    assert_eq!(changeset.unchanged().len(), records.len());
}

#[test]
fn ids_do_not_affect_equality() {
    let current = vec![a("www.example.com.", "10.0.0.1", 60).with_id("abc")];
    let desired = vec![a("www.example.com.", "10.0.0.1", 60)];

    let changeset = changeset(current, desired);
    assert!(changeset.is_empty());
    assert_eq!(changeset.unchanged()[0].id(), Some("abc"));
}

#[test]
fn cname_replaced_by_a_record() {
    let current = vec![cname("www.example.com.", "www.example.org.", 60)];
    let desired = vec![a("www.example.com.", "10.11.12.13", 60)];

    let changeset = changeset(current.clone(), desired.clone());
    assert_eq!(changeset.additions(), &[Change::Addition(desired[0].clone())]);
    assert_eq!(changeset.removals(), &[Change::Removal(current[0].clone())]);
    assert!(changeset.updates().is_empty());
}

#[test]
fn identical_record_is_unchanged_before_pairing() {
    // The 60s record is identical on both sides and drops out first, so
    // the 120s record has nothing left to pair with.
    let current = vec![
        a("host.example.com.", "8.8.8.8", 60).with_id("1"),
        a("host.example.com.", "8.8.8.8", 120).with_id("2"),
    ];
    let desired = vec![a("host.example.com.", "8.8.8.8", 60)];

    let changeset = changeset(current.clone(), desired);
    assert_eq!(changeset.unchanged(), &[current[0].clone()]);
    assert_eq!(changeset.removals(), &[Change::Removal(current[1].clone())]);
    assert!(changeset.updates().is_empty());
    assert!(changeset.additions().is_empty());
}

#[test]
fn same_key_groups_pair_in_sorted_order() {
    let current = vec![
        a("host.example.com.", "10.0.0.2", 60).with_id("two"),
        a("host.example.com.", "10.0.0.1", 60).with_id("one"),
    ];
    let desired = vec![a("host.example.com.", "10.0.0.3", 60)];

    let changeset = changeset(current, desired.clone());

    // Lowest rdata pairs first: 10.0.0.1 is updated, 10.0.0.2 removed
    assert_eq!(changeset.updates().len(), 1);
    assert_eq!(changeset.updates()[0].id(), Some("one"));
    assert_eq!(changeset.updates()[0].record(), &desired[0]);
    assert_eq!(changeset.removals().len(), 1);
    assert_eq!(changeset.removals()[0].id(), Some("two"));
}

#[test]
fn diffing_is_deterministic() {
    let current = vec![
        a("host.example.com.", "10.0.0.7", 60),
        a("host.example.com.", "10.0.0.3", 60),
        a("host.example.com.", "10.0.0.5", 60),
        txt("host.example.com.", "b"),
        txt("host.example.com.", "a"),
    ];
    let desired = vec![
        a("host.example.com.", "10.0.0.4", 60),
        a("host.example.com.", "10.0.0.1", 60),
        txt("host.example.com.", "c"),
    ];

    let first = diff(&current, &desired);
    for _ in 0..10 {
        assert_eq!(diff(&current, &desired), first);
    }

    let mut shuffled = current.clone();
    shuffled.reverse();
    assert_eq!(diff(&shuffled, &desired), first);
}

#[test]
fn changes_are_ordered_updates_removals_additions() {
    let current = vec![
        a("www.example.com.", "10.0.0.1", 60).with_id("1"),
        a("gone.example.com.", "10.0.0.2", 60).with_id("2"),
    ];
    let desired = vec![
        a("www.example.com.", "10.0.0.9", 60),
        a("fresh.example.com.", "10.0.0.3", 60),
    ];

    let changeset = changeset(current, desired);
    let kinds: Vec<_> = changeset.changes().map(Change::kind).collect();
    assert_eq!(
        kinds,
        vec![
            zonesync_core::ChangeKind::Update,
            zonesync_core::ChangeKind::Removal,
            zonesync_core::ChangeKind::Addition,
        ]
    );
}
