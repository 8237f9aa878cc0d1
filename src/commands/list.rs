//! List commands implementation

use crate::backends;

/// List all supported backends
pub fn list_backends() {
    println!("Supported backends:");
    println!();

    for b in backends::available_backends() {
        println!("  {:10} - {}", b.name, b.description);
        if !b.aliases.is_empty() {
            println!("  {:10}   aliases: {}", "", b.aliases.join(", "));
        }
        if b.requires_root {
            println!("  {:10}   requires root", "");
        }
    }
}
