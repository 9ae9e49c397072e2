//! Memory tag command CLI definitions

use clap::Subcommand;

use super::parse_address;

#[derive(Subcommand)]
pub enum TagsCommand {
    /// Validate the block whose user data starts at an address
    Check {
        /// User data address
        #[arg(value_parser = parse_address)]
        address: u64,

        /// Expect freed-block eyecatchers
        #[arg(long)]
        freed: bool,
    },

    /// Find every tagged block in an address range
    Scan {
        #[arg(value_parser = parse_address)]
        start: u64,

        #[arg(value_parser = parse_address)]
        end: u64,

        /// Only report blocks that fail validation
        #[arg(long)]
        corrupt_only: bool,
    },
}
