//! Info command implementation

use st25dv_core::{AreaId, AreaLayout, Variant, WriteMode};

/// Print the area table of a variant
pub fn print_area_table(variant: Variant, write_mode: WriteMode) {
    println!("ST25DV Area Table");
    println!("=================");
    println!();
    println!("Variant:         {}", variant);
    println!("User memory:     {} bytes", variant.user_size());
    println!("Write mode:      {:?}", write_mode);
    println!();
    println!(
        "{:<16} {:<16} {:>8} {:>8}",
        "Area", "Endpoint", "Base", "Size"
    );
    println!("{}", "-".repeat(51));

    for id in AreaId::ALL {
        let layout = AreaLayout::of(id, variant);
        println!(
            "{:<16} {:<16} {:>8} {:>8}",
            id.name(),
            layout.endpoint.to_string(),
            format!("0x{:04X}", layout.base_offset),
            layout.size
        );
    }
}
