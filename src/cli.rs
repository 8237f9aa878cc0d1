//! CLI argument parsing

use clap::{Parser, Subcommand};
use st25dv_core::{AreaId, Variant};
use std::path::PathBuf;

/// Parse a string as a hex or decimal u16
fn parse_hex_u16(s: &str) -> Result<u16, String> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u16::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex value: {}", e))
    } else {
        s.parse::<u16>().map_err(|e| format!("Invalid number: {}", e))
    }
}

/// Parse a string as a hex or decimal usize
fn parse_hex_usize(s: &str) -> Result<usize, String> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        usize::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex value: {}", e))
    } else {
        s.parse::<usize>().map_err(|e| format!("Invalid number: {}", e))
    }
}

/// Parse an area name or alias
fn parse_area(s: &str) -> Result<AreaId, String> {
    AreaId::from_name(s).ok_or_else(|| {
        format!(
            "Unknown area: {} (use user, sys, dyn or mailbox)",
            s
        )
    })
}

/// Parse a user memory variant
fn parse_variant(s: &str) -> Result<Variant, String> {
    Variant::from_name(s).ok_or_else(|| format!("Unknown variant: {} (use 04k, 16k or 64k)", s))
}

/// Parse a password given as exactly 16 hex digits, most significant first
pub fn parse_password(s: &str) -> Result<u64, String> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    if digits.len() != 16 {
        return Err(format!(
            "Password must be exactly 16 hex digits, got {}",
            digits.len()
        ));
    }
    u64::from_str_radix(digits, 16).map_err(|e| format!("Invalid password: {}", e))
}

#[derive(Parser)]
#[command(name = "st25dv")]
#[command(author, version, about = "ST25DV dynamic NFC tag access over I2C", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Backend to use, e.g. "dummy" or "linux_i2c:dev=/dev/i2c-1"
    #[arg(short, long, global = true)]
    pub backend: Option<String>,

    /// Chip variant (04k, 16k or 64k)
    #[arg(long, global = true, default_value = "04k", value_parser = parse_variant)]
    pub variant: Variant,

    /// Write in address-prefixed blocks instead of one byte per transaction
    #[arg(long, global = true)]
    pub block: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Read an area to a file or as a hex dump
    Read {
        /// Area (user, sys, dyn, mailbox)
        #[arg(value_parser = parse_area)]
        area: AreaId,

        /// Start offset within the area (hex or decimal)
        #[arg(value_parser = parse_hex_u16)]
        offset: u16,

        /// Number of bytes (default: up to the end of the area)
        #[arg(value_parser = parse_hex_usize)]
        length: Option<usize>,

        /// Output file path (prints a hex dump if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Write bytes into an area
    #[command(group(clap::ArgGroup::new("data").required(true).args(["input", "hex"])))]
    Write {
        /// Area (user, sys, dyn, mailbox)
        #[arg(value_parser = parse_area)]
        area: AreaId,

        /// Start offset within the area (hex or decimal)
        #[arg(value_parser = parse_hex_u16)]
        offset: u16,

        /// Input file path
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Bytes as hex, e.g. "de ad be ef" or "deadbeef"
        #[arg(long)]
        hex: Option<String>,
    },

    /// Present the I2C password to open the security session
    PresentPassword {
        /// Password as 16 hex digits
        #[arg(value_parser = parse_password)]
        password: u64,
    },

    /// Change the I2C password (the session must be open)
    ChangePassword {
        /// New password as 16 hex digits
        #[arg(value_parser = parse_password)]
        password: u64,
    },

    /// Show the area table
    Info,

    /// List supported backends
    ListBackends,
}
