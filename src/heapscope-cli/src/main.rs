mod cli;
mod commands;
mod config;
mod source;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::*;
use commands::configure::ConfigUpdate;

const DEFAULT_FILTER: &str = "heapscope=info";
const VERBOSE_FILTER: &str = "heapscope=debug";

fn init_logging(verbose: bool) {
    // RUST_LOG wins over -v
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if verbose {
            VERBOSE_FILTER
        } else {
            DEFAULT_FILTER
        })
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Walk {
            target,
            bounds,
            min_string,
            no_pointers,
            json,
        } => {
            commands::walk::handle(&target, &bounds, min_string, no_pointers, json)?;
        }

        Commands::Bounds { target } => {
            commands::bounds::handle(&target)?;
        }

        Commands::Graph {
            target,
            bounds,
            seeds,
            max_nodes,
            format,
            output,
        } => {
            commands::graph::handle(
                &target,
                &bounds,
                &seeds,
                max_nodes,
                format,
                output.as_deref(),
            )?;
        }

        Commands::Block {
            target,
            bounds,
            address,
            limit,
        } => {
            commands::block::handle(&target, &bounds, address, limit)?;
        }

        Commands::Configure {
            min_string_length,
            max_graph_nodes,
            scan_pointers,
            show,
        } => {
            let update = ConfigUpdate {
                min_string_length,
                max_graph_nodes,
                scan_pointers,
            };
            commands::configure::handle(update, show)?;
        }
    }

    Ok(())
}
