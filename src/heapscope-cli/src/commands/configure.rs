//! Configuration command handlers
//!
//! Handles the `configure` subcommand for setting heapscope defaults.

use crate::config::Config;
use anyhow::{ensure, Result};

/// New values requested on the command line
#[derive(Debug, Default, Clone, Copy)]
pub struct ConfigUpdate {
    pub min_string_length: Option<usize>,
    pub max_graph_nodes: Option<usize>,
    pub scan_pointers: Option<bool>,
}

impl ConfigUpdate {
    fn is_empty(&self) -> bool {
        self.min_string_length.is_none()
            && self.max_graph_nodes.is_none()
            && self.scan_pointers.is_none()
    }
}

/// Handle the configure command
pub fn handle(update: ConfigUpdate, show: bool) -> Result<()> {
    let mut config = Config::load()?;

    if show {
        show_config(&config);
        return Ok(());
    }

    if update.is_empty() {
        show_usage();
        return Ok(());
    }

    apply(&mut config, update)?;
    let path = config.save()?;
    show_config(&config);
    println!("Config saved to: {}", path.display());

    Ok(())
}

fn apply(config: &mut Config, update: ConfigUpdate) -> Result<()> {
    if let Some(len) = update.min_string_length {
        config.min_string_length = len;
    }
    if let Some(nodes) = update.max_graph_nodes {
        ensure!(nodes > 0, "max-graph-nodes must be at least 1");
        config.max_graph_nodes = nodes;
    }
    if let Some(scan) = update.scan_pointers {
        config.scan_pointers = scan;
    }
    Ok(())
}

/// Display current configuration
fn show_config(config: &Config) {
    println!("Minimum string length: {}", config.min_string_length);
    println!("Graph node limit:      {}", config.max_graph_nodes);
    println!("Pointer scan:          {}", config.scan_pointers);

    if let Ok(path) = Config::config_path() {
        println!("Config file: {}", path.display());
    }
}

/// Show usage help for the configure command
fn show_usage() {
    println!("Usage: heapscope configure --min-string-length N");
    println!("   or: heapscope configure --max-graph-nodes N");
    println!("   or: heapscope configure --scan-pointers true|false");
    println!("   or: heapscope configure --show");
}
