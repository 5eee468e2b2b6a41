use std::collections::BTreeMap;
use anyhow::{Context, Result};
use serde::Serialize;
use structopt::StructOpt;
use tracing::*;
use tracing_subscriber::fmt;
use consistent_ring::Ring;
use consistent_ring::config::{Configuration, Opt};

#[derive(Debug, Serialize)]
struct Assignment<'a> {
    key: &'a str,
    node: &'a str,
    position: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NodeShare {
    keys: usize,
    share: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DistributionReport {
    sample_size: usize,
    virtual_nodes: usize,
    nodes: BTreeMap<String, NodeShare>,
}

fn main() -> Result<()> {
    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("setting default subscriber failed")?;

    let span = span!(Level::INFO, "ring-probe");
    let _guard = span.enter();

    let opt = Opt::from_args();
    let configuration = Configuration::load(&opt).context("failed to load ring configuration")?;
    let ring = configuration.build_ring().context("failed to build ring")?;
    info!(%ring, "ring ready");

    for key in &opt.keys {
        let node = ring.lookup(key).with_context(|| format!("failed to look up key {}", key))?;
        let assignment = Assignment { key, node, position: ring.position_of(key) };
        println!("{}", serde_json::to_string(&assignment)?);
    }

    if let Some(sample_size) = opt.sample {
        let report = distribution(&ring, sample_size)?;
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    Ok(())
}

fn distribution(ring: &Ring, sample_size: usize) -> Result<DistributionReport> {
    let mut counts: BTreeMap<String, usize> = ring.list_nodes().into_iter().map(|n| (n, 0)).collect();

    for i in 0..sample_size {
        let node = ring.lookup(format!("key-{}", i))?;
        if let Some(count) = counts.get_mut(node) {
            *count += 1;
        }
    }

    let nodes = counts
        .into_iter()
        .map(|(node, keys)| {
            let share = if sample_size == 0 { 0.0 } else { keys as f64 / sample_size as f64 };
            (node, NodeShare { keys, share })
        })
        .collect();

    Ok(DistributionReport {
        sample_size,
        virtual_nodes: ring.virtual_nodes_per_node(),
        nodes,
    })
}
