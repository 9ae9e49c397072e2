//! Core CLI definitions

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use super::parse_address;
use super::shrc::ShrcCommand;
use super::tags::TagsCommand;

#[derive(Parser)]
#[command(name = "heapscope")]
#[command(about = "Decode objects, classes and runtime metadata from memory images", long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub image: ImageArgs,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable debug logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Where the image comes from and how to interpret it
#[derive(Args, Debug, Clone, Default)]
pub struct ImageArgs {
    /// Memory dump file (raw, gcore or minidump)
    #[arg(long, short = 'd', global = true)]
    pub dump: Option<PathBuf>,

    /// Path to maps file for dump (defaults to <dump>.maps, then the configured maps file)
    #[arg(long, global = true)]
    pub maps: Option<PathBuf>,

    /// Image is big-endian
    #[arg(long, global = true)]
    pub big_endian: bool,

    /// Address of the runtime descriptor to probe the profile from
    #[arg(long, global = true, value_parser = parse_address)]
    pub root: Option<u64>,

    /// Session profile TOML (used instead of probing; defaults to the configured profile)
    #[arg(long, global = true)]
    pub profile: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show the resolved session profile
    #[command(visible_alias = "p")]
    Profile,

    /// Decode a RAM class
    #[command(visible_alias = "c")]
    Class {
        /// Class address
        #[arg(value_parser = parse_address)]
        address: u64,

        /// List instance and static fields with their offsets
        #[arg(short, long)]
        fields: bool,

        /// Show the allocated size breakdown
        #[arg(short, long)]
        size: bool,
    },

    /// Resolve a field of a class
    #[command(visible_alias = "f")]
    Field {
        /// Class address
        #[arg(value_parser = parse_address)]
        class: u64,

        /// Field name, or a dotted path through flattened fields (e.g. "end.y")
        name: String,

        /// Field signature (e.g. "I", "Ljava/lang/String;"); any signature if omitted
        #[arg(short, long)]
        signature: Option<String>,
    },

    /// Decode an object header and its field values
    #[command(visible_alias = "o")]
    Object {
        /// Object address
        #[arg(value_parser = parse_address)]
        address: u64,
    },

    /// Decode a String object
    String {
        /// String object address
        #[arg(value_parser = parse_address)]
        address: u64,
    },

    /// Read array elements
    #[command(visible_alias = "a")]
    Array {
        /// Array object address
        #[arg(value_parser = parse_address)]
        address: u64,

        /// First element index
        #[arg(short, long, default_value = "0")]
        start: u64,

        /// Number of elements (defaults to the rest of the array, at most 64)
        #[arg(short = 'n', long)]
        length: Option<u64>,
    },

    /// Hex dump raw memory
    #[command(visible_alias = "r")]
    Read {
        /// Start address
        #[arg(value_parser = parse_address)]
        address: u64,

        /// Number of bytes
        #[arg(default_value = "64")]
        size: usize,
    },

    /// Shared class cache records and metadata
    Shrc {
        #[command(subcommand)]
        command: ShrcCommand,
    },

    /// Debug memory tags
    #[command(visible_alias = "t")]
    Tags {
        #[command(subcommand)]
        command: TagsCommand,
    },

    /// Configure default settings
    Configure {
        /// Set default session profile file
        #[arg(long)]
        profile: Option<PathBuf>,

        /// Set default maps file
        #[arg(long)]
        maps: Option<PathBuf>,

        /// Clear all defaults
        #[arg(long)]
        clear: bool,

        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
}
