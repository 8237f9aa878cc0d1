//! st25dv - Access ST25DV dynamic NFC tags over I2C
//!
//! Reads and writes the user EEPROM, system configuration, dynamic
//! registers and fast transfer mailbox of an ST25DV, and drives its I2C
//! password protocol.
//!
//! # Architecture
//!
//! Every backend hands out one bus endpoint per chip address. The two
//! endpoints are attached to a single `st25dv_core::Device`, which owns the
//! area table and serializes all access to the chip, so the same command
//! implementations work with the emulator and with real adapters.

mod backends;
mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use st25dv_core::{Device, DeviceConfig, WriteMode};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // Set log level based on verbosity
    match cli.verbose {
        0 => {} // default (info)
        1 => log::set_max_level(log::LevelFilter::Debug),
        _ => log::set_max_level(log::LevelFilter::Trace),
    }

    let write_mode = if cli.block {
        WriteMode::Block
    } else {
        WriteMode::Byte
    };
    let config = DeviceConfig::new()
        .with_variant(cli.variant)
        .with_write_mode(write_mode);

    let open_device = || -> Result<Device<backends::BoxedEndpoint>, Box<dyn std::error::Error>> {
        let (primary, system) = backends::open_backend(cli.backend.as_deref(), cli.variant)?;
        Ok(Device::attach(primary, system, config))
    };

    match &cli.command {
        Commands::Read {
            area,
            offset,
            length,
            output,
        } => {
            let device = open_device()?;
            commands::read::run_read(&device, *area, *offset, *length, output.as_deref())
        }
        Commands::Write {
            area,
            offset,
            input,
            hex,
        } => {
            let data = commands::write::load_input(input.as_deref(), hex.as_deref())?;
            let device = open_device()?;
            commands::write::run_write(&device, *area, *offset, &data)
        }
        Commands::PresentPassword { password } => {
            let device = open_device()?;
            commands::password::run_present(&device, *password)
        }
        Commands::ChangePassword { password } => {
            let device = open_device()?;
            commands::password::run_change(&device, *password)
        }
        Commands::Info => {
            commands::print_area_table(cli.variant, write_mode);
            Ok(())
        }
        Commands::ListBackends => {
            commands::list_backends();
            Ok(())
        }
    }
}
