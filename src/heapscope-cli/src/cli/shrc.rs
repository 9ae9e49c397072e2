//! Shared class cache command CLI definitions

use clap::Subcommand;

use super::parse_address;

#[derive(Subcommand)]
pub enum ShrcCommand {
    /// Decode one wrapper record
    Record {
        /// Record address
        #[arg(value_parser = parse_address)]
        address: u64,

        /// Record kind (rom-class, scoped-rom-class, orphan, compiled-method,
        /// byte-data, attached-data, char-array)
        kind: String,

        /// Base address of each cache layer, comma separated
        #[arg(long, value_delimiter = ',', value_parser = parse_address)]
        layers: Vec<u64>,
    },

    /// Walk the metadata items of a range, highest address first
    Items {
        /// Start of the metadata area
        #[arg(value_parser = parse_address)]
        start: u64,

        /// End of the metadata area
        #[arg(value_parser = parse_address)]
        end: u64,

        /// Also decode the wrapper record of each item
        #[arg(short, long)]
        records: bool,

        /// Skip stale items
        #[arg(long)]
        skip_stale: bool,

        /// Base address of each cache layer, comma separated
        #[arg(long, value_delimiter = ',', value_parser = parse_address)]
        layers: Vec<u64>,
    },
}
