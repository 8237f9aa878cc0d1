//! CLI command implementations
//!
//! Every command that touches the chip works on a [`st25dv_core::Device`]
//! over any endpoint type, so the same code runs against the emulator and
//! real adapters.

mod info;
mod list;
pub mod password;
pub mod read;
pub mod write;

pub use info::print_area_table;
pub use list::list_backends;

use indicatif::{ProgressBar, ProgressStyle};

/// Byte progress bar shared by read and write
fn progress_bar(total: usize, phase: &str) -> ProgressBar {
    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(&format!(
                "{{spinner:.green}} [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{bytes}}/{{total_bytes}} ({{bytes_per_sec}}, {{eta}}) {}",
                phase
            ))
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb
}
