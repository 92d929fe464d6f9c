//! CLI argument definitions

mod core;
mod target;

pub use self::core::{Cli, Commands, GraphFormat};
pub use self::target::{BoundsArgs, TargetArgs};

use anyhow::{Context, Result};

/// Parse an address given as `0x`-prefixed hex or decimal
pub fn parse_address(address: &str) -> Result<u64> {
    let address = address.trim();
    if let Some(hex) = address
        .strip_prefix("0x")
        .or_else(|| address.strip_prefix("0X"))
    {
        u64::from_str_radix(&hex.replace('_', ""), 16).context("Invalid hex address")
    } else {
        address.parse::<u64>().context("Invalid address")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_address() {
        assert_eq!(parse_address("0x5000").unwrap(), 0x5000);
        assert_eq!(parse_address("0X7fff_0000").unwrap(), 0x7fff_0000);
        assert_eq!(parse_address("4096").unwrap(), 4096);
        assert_eq!(parse_address(" 0x10 ").unwrap(), 0x10);
    }

    #[test]
    fn test_parse_address_invalid() {
        assert!(parse_address("0x").is_err());
        assert!(parse_address("0xzz").is_err());
        assert!(parse_address("-1").is_err());
        assert!(parse_address("heap").is_err());
        assert!(parse_address("0x1_0000_0000_0000_0000").is_err());
    }
}
