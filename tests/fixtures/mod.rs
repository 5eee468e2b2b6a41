#![allow(dead_code)]

use std::collections::BTreeMap;
use tracing_subscriber::fmt;
use consistent_ring::{KeyHasher, Ring};

pub fn setup_logger() {
    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .finish();

    // every test calls this; only the first install wins
    let _ = tracing::subscriber::set_global_default(subscriber);
}

pub fn sample_keys(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("key-{}", i)).collect()
}

pub fn make_ring<H: KeyHasher>(mut ring: Ring<H>, nodes: &[&str]) -> Ring<H> {
    for node in nodes {
        ring.add_node(node).unwrap();
    }
    ring
}

pub fn snapshot<H: KeyHasher>(ring: &Ring<H>, keys: &[String]) -> Vec<String> {
    keys.iter().map(|k| ring.lookup(k).unwrap().to_owned()).collect()
}

pub fn counts(owners: &[String]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for owner in owners {
        *counts.entry(owner.clone()).or_insert(0) += 1;
    }
    counts
}
