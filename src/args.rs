use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use kfn_operator::core::config::{parse_key_value, OperatorConfig};

/// Kubernetes operator for kfn stream-processing functions
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct OperatorArgs {
    /// Configuration file, extension optional (toml, yaml and json are recognised)
    #[arg(short, long, default_value = "kfn-operator")]
    pub config: String,
    /// Kafka bootstrap servers handed to every function
    #[arg(long)]
    pub bootstrap_servers: Option<String>,
    /// Default function property, as key:value
    #[arg(long = "function-config", value_parser = parse_key_value)]
    pub function_config: Vec<(String, String)>,
    /// Default consumer property, as key:value
    #[arg(long = "consumer-config", value_parser = parse_key_value)]
    pub consumer_config: Vec<(String, String)>,
    /// Default producer property, as key:value
    #[arg(long = "producer-config", value_parser = parse_key_value)]
    pub producer_config: Vec<(String, String)>,
    /// Number of Functions reconciled concurrently
    #[arg(short, long)]
    pub workers: Option<u16>,
    /// Watch a single namespace instead of the whole cluster
    #[arg(short, long)]
    pub namespace: Option<String>,
    #[clap(subcommand)]
    pub subcommand: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the operator (default)
    Run,
    /// Print the Function custom resource definition
    Crd,
    /// Print the properties derived for a Function manifest
    Render(RenderArgs),
}

#[derive(Args, Debug)]
pub struct RenderArgs {
    #[arg(short, long)]
    pub file: PathBuf,
}

impl OperatorArgs {
    /// Command line flags take precedence over file and environment settings.
    pub fn apply_to(&self, cfg: &mut OperatorConfig) {
        if let Some(bootstrap_servers) = &self.bootstrap_servers {
            cfg.bootstrap_servers = bootstrap_servers.clone();
        }
        cfg.defaults.function.extend(self.function_config.iter().cloned());
        cfg.defaults.consumer.extend(self.consumer_config.iter().cloned());
        cfg.defaults.producer.extend(self.producer_config.iter().cloned());
        if let Some(workers) = self.workers {
            cfg.workers = workers;
        }
        if let Some(namespace) = &self.namespace {
            cfg.namespace = Some(namespace.clone());
        }
    }
}
