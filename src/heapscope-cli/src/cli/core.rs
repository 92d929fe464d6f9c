//! Core CLI definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use super::target::{BoundsArgs, TargetArgs};
use super::parse_address;

#[derive(Parser)]
#[command(name = "heapscope")]
#[command(about = "glibc heap walker for live processes and core dumps", long_about = None)]
pub struct Cli {
    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List every heap block with its state and contents
    #[command(visible_alias = "w")]
    Walk {
        #[command(flatten)]
        target: TargetArgs,

        #[command(flatten)]
        bounds: BoundsArgs,

        /// Shortest run of characters reported as a string
        #[arg(short, long)]
        min_string: Option<usize>,

        /// Skip the pointer scan
        #[arg(long)]
        no_pointers: bool,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Show where the heap starts and ends, and how that was found
    #[command(visible_alias = "b")]
    Bounds {
        #[command(flatten)]
        target: TargetArgs,
    },

    /// Export the blocks reachable from one or more seed blocks
    #[command(visible_alias = "g")]
    Graph {
        #[command(flatten)]
        target: TargetArgs,

        #[command(flatten)]
        bounds: BoundsArgs,

        /// Block address to start from (repeatable)
        #[arg(short, long = "seed", required = true, value_parser = parse_address)]
        seeds: Vec<u64>,

        /// Refuse graphs with more nodes than this
        #[arg(long)]
        max_nodes: Option<usize>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "dot")]
        format: GraphFormat,

        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show one block's header, contents and hex dump
    Block {
        #[command(flatten)]
        target: TargetArgs,

        #[command(flatten)]
        bounds: BoundsArgs,

        /// Any address inside the block (hex with 0x prefix, or decimal)
        #[arg(value_parser = parse_address)]
        address: u64,

        /// Maximum bytes to dump
        #[arg(short, long, default_value = "256")]
        limit: usize,
    },

    /// Configure default settings
    #[command(visible_alias = "c")]
    Configure {
        /// Set the default minimum string length
        #[arg(long)]
        min_string_length: Option<usize>,

        /// Set the default graph node limit
        #[arg(long)]
        max_graph_nodes: Option<usize>,

        /// Enable or disable the pointer scan by default
        #[arg(long)]
        scan_pointers: Option<bool>,

        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum GraphFormat {
    /// Graphviz DOT
    Dot,
    /// Nodes and edges as JSON
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_walk_with_explicit_bounds() {
        let cli = Cli::try_parse_from([
            "heapscope", "walk", "--pid", "42", "--start", "0x1000", "--end", "0x2000", "--json",
        ])
        .unwrap();

        match cli.command {
            Commands::Walk {
                target,
                bounds,
                json,
                no_pointers,
                ..
            } => {
                assert_eq!(target.pid, Some(42));
                assert_eq!(bounds.start, Some(0x1000));
                assert_eq!(bounds.end, Some(0x2000));
                assert!(json);
                assert!(!no_pointers);
            }
            _ => panic!("expected walk"),
        }
    }

    #[test]
    fn test_start_requires_end() {
        let args = ["heapscope", "walk", "--pid", "1", "--start", "0x1000"];
        assert!(Cli::try_parse_from(args).is_err());
    }

    #[test]
    fn test_pid_conflicts_with_dump() {
        assert!(
            Cli::try_parse_from(["heapscope", "bounds", "--pid", "1", "--dump", "core"]).is_err()
        );
    }

    #[test]
    fn test_graph_seeds() {
        let cli = Cli::try_parse_from([
            "heapscope", "graph", "--dump", "core", "--seed", "0x5000", "-s", "20544",
        ])
        .unwrap();

        match cli.command {
            Commands::Graph { seeds, format, .. } => {
                assert_eq!(seeds, vec![0x5000, 0x5040]);
                assert_eq!(format, GraphFormat::Dot);
            }
            _ => panic!("expected graph"),
        }
        assert!(Cli::try_parse_from(["heapscope", "graph", "--pid", "1"]).is_err());
    }
}
