use std::path::PathBuf;
use serde::Deserialize;
use structopt::StructOpt;
use thiserror::Error;
use tracing::*;
use config::Config;
use crate::ring::{Ring, RingError, DEFAULT_VIRTUAL_NODES};

#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("application misconfigured")]
    ConfigSource(#[from] config::ConfigError),

    #[error("configured ring is invalid")]
    Ring(#[from] RingError),
}

#[derive(StructOpt, Debug, Default)]
#[structopt(name = "ring-probe")]
pub struct Opt {
    /// application configuration
    #[structopt(long = "config", parse(from_os_str))]
    pub configuration_path: Option<PathBuf>,

    /// overrides the configured virtual nodes per node
    #[structopt(long)]
    pub virtual_nodes: Option<usize>,

    /// additional node to register; may be repeated
    #[structopt(short, long = "node", number_of_values = 1)]
    pub nodes: Vec<String>,

    /// report how many of `n` synthetic keys each node owns
    #[structopt(long)]
    pub sample: Option<usize>,

    /// keys to look up
    pub keys: Vec<String>,
}

#[derive(Deserialize, Debug, Clone)]
struct ConfigSchema {
    #[serde(default = "default_virtual_nodes")]
    pub virtual_nodes: usize,
    #[serde(default)]
    pub nodes: Vec<String>,
}

fn default_virtual_nodes() -> usize { DEFAULT_VIRTUAL_NODES }

#[derive(Debug, Clone, PartialEq)]
pub struct Configuration {
    pub virtual_nodes: usize,
    pub nodes: Vec<String>,
}

impl Configuration {
    /// Layers `config/reference.toml`, the optional `--config` file and `RING_*`
    /// environment variables (later wins), then applies command line overrides.
    #[tracing::instrument]
    pub fn load(opt: &Opt) -> Result<Configuration, ConfigurationError> {
        info!("CLI options {:?}", opt);

        let mut config = Config::default();

        let ref_path = std::path::Path::new("config/reference.toml");
        config.merge(config::File::from(ref_path).required(false))?;

        if let Some(path) = opt.configuration_path.as_ref() {
            config.merge(config::File::from(path.as_path()))?;
        }

        config.merge(config::Environment::with_prefix("RING"))?;

        let mut configuration = Self::load_from_config(config)?;
        if let Some(v) = opt.virtual_nodes {
            configuration.virtual_nodes = v;
        }
        configuration.nodes.extend(opt.nodes.iter().cloned());

        info!("ring configuration: {:?}", configuration);
        Ok(configuration)
    }

    pub fn load_from_config(mut config: Config) -> Result<Configuration, ConfigurationError> {
        // an untouched Config has no root table until refreshed
        config.refresh()?;
        let schema = config.try_into::<ConfigSchema>()?;
        Ok(Configuration {
            virtual_nodes: schema.virtual_nodes,
            nodes: schema.nodes,
        })
    }

    /// Builds a ring holding every configured node.
    pub fn build_ring(&self) -> Result<Ring, ConfigurationError> {
        let mut ring = Ring::new(self.virtual_nodes)?;
        for node in &self.nodes {
            ring.add_node(node)?;
        }
        Ok(ring)
    }
}
