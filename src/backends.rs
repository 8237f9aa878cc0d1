//! Backend registration and dispatch
//!
//! This module provides a centralized registry for all bus backends, with
//! support for feature-gated inclusion and dynamic help text generation.

use st25dv_core::bus::{BackendInfo, I2cEndpoint};
use st25dv_core::Variant;
use thiserror::Error;

/// Boxed endpoint handed to the device
pub type BoxedEndpoint = Box<dyn I2cEndpoint + Send>;

/// Backend selection errors
#[derive(Debug, Error)]
pub enum BackendError {
    /// No backend given on the command line
    #[error("No backend specified. Use -b <backend>\n\n{0}")]
    Missing(String),

    /// Name does not match any compiled-in backend
    #[error("Unknown backend: {name}\n\n{help}\nUse 'st25dv list-backends' for more details")]
    Unknown { name: String, help: String },

    /// Options could not be parsed
    #[error("Invalid {backend} parameters: {message}")]
    InvalidOptions {
        backend: &'static str,
        message: String,
    },

    /// Backend failed to open
    #[error("Failed to open {backend}: {message}")]
    OpenFailed {
        backend: &'static str,
        message: String,
    },
}

/// Get information about all available backends (enabled at compile time)
#[allow(unused_mut, clippy::vec_init_then_push)]
pub fn available_backends() -> Vec<BackendInfo> {
    let mut backends = Vec::new();

    #[cfg(feature = "dummy")]
    backends.push(BackendInfo {
        name: "dummy",
        aliases: &["emulator"],
        description: "In-memory ST25DV emulator (variant=<04k|16k|64k>,block=<n>,password=<hex16>)",
        requires_root: false,
    });

    #[cfg(feature = "linux-i2c")]
    backends.push(BackendInfo {
        name: "linux_i2c",
        aliases: &["linux-i2c", "i2cdev"],
        description: "Linux i2c-dev interface (dev=/dev/i2c-N,addr=<0x53>,sysaddr=<0x57>,block=<n>)",
        requires_root: false,
    });

    backends
}

/// Generate help text listing all available backends
pub fn backend_help() -> String {
    let backends = available_backends();

    if backends.is_empty() {
        return "No backends available (recompile with backend features enabled)".to_string();
    }

    let mut help = String::from("Available backends:\n");
    for b in &backends {
        help.push_str(&format!("  {:12} - {}\n", b.name, b.description));
    }
    help
}

/// Resolve a backend name or alias to its canonical name
pub fn find_backend(name: &str) -> Option<&'static str> {
    available_backends()
        .into_iter()
        .find(|b| b.name == name || b.aliases.contains(&name))
        .map(|b| b.name)
}

/// Parse a backend string into name and options
///
/// Format: "name" or "name:option1=value1,option2=value2"
pub fn parse_backend_string(s: &str) -> (&str, Vec<(&str, &str)>) {
    if let Some((name, opts)) = s.split_once(':') {
        let options: Vec<_> = opts
            .split(',')
            .filter_map(|opt| opt.split_once('='))
            .collect();
        (name, options)
    } else {
        (s, Vec::new())
    }
}

/// Open the primary and system endpoints described by `backend`
///
/// `variant` sizes the emulated chip when the backend string does not say.
#[allow(unused_variables)]
pub fn open_backend(
    backend: Option<&str>,
    variant: Variant,
) -> Result<(BoxedEndpoint, BoxedEndpoint), BackendError> {
    let backend = backend.ok_or_else(|| BackendError::Missing(backend_help()))?;
    let (name, options) = parse_backend_string(backend);

    let canonical_name = find_backend(name).ok_or_else(|| BackendError::Unknown {
        name: name.to_string(),
        help: backend_help(),
    })?;

    match canonical_name {
        #[cfg(feature = "dummy")]
        "dummy" => {
            let mut config = st25dv_dummy::parse_options(&options).map_err(|message| {
                BackendError::InvalidOptions {
                    backend: "dummy",
                    message,
                }
            })?;
            if !options.iter().any(|(k, _)| *k == "variant") {
                config.variant = variant;
            }

            log::info!("Using dummy {} emulator", config.variant);
            let (primary, system) = st25dv_dummy::DummySt25dv::new(config).endpoints();
            let primary: BoxedEndpoint = Box::new(primary);
            let system: BoxedEndpoint = Box::new(system);
            Ok((primary, system))
        }

        #[cfg(feature = "linux-i2c")]
        "linux_i2c" => {
            use st25dv_linux_i2c::{parse_options, LinuxI2c};

            log::info!("Opening Linux I2C backend...");

            let config = parse_options(&options).map_err(|message| {
                BackendError::InvalidOptions {
                    backend: "linux_i2c",
                    message,
                }
            })?;

            let (primary, system) =
                LinuxI2c::open_pair(&config).map_err(|e| BackendError::OpenFailed {
                    backend: "linux_i2c",
                    message: format!(
                        "{}\nMake sure the adapter exists and you have read/write permissions.\n\
                         You may need to: sudo usermod -aG i2c $USER",
                        e
                    ),
                })?;
            let primary: BoxedEndpoint = Box::new(primary);
            let system: BoxedEndpoint = Box::new(system);
            Ok((primary, system))
        }

        _ => Err(BackendError::Unknown {
            name: name.to_string(),
            help: backend_help(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_backend_string() {
        assert_eq!(parse_backend_string("dummy"), ("dummy", vec![]));
        assert_eq!(
            parse_backend_string("linux_i2c:dev=/dev/i2c-1,addr=0x53"),
            ("linux_i2c", vec![("dev", "/dev/i2c-1"), ("addr", "0x53")])
        );
        // Options without a value are dropped
        assert_eq!(
            parse_backend_string("dummy:block=8,bogus"),
            ("dummy", vec![("block", "8")])
        );
    }

    #[test]
    fn test_missing_backend() {
        assert!(matches!(
            open_backend(None, Variant::St25dv04k),
            Err(BackendError::Missing(_))
        ));
    }

    #[test]
    fn test_unknown_backend() {
        assert!(find_backend("ch341a").is_none());
        assert!(matches!(
            open_backend(Some("ch341a"), Variant::St25dv04k),
            Err(BackendError::Unknown { .. })
        ));
    }

    #[cfg(feature = "dummy")]
    #[test]
    fn test_dummy_backend_opens() {
        use st25dv_core::{AreaId, Device, DeviceConfig};

        assert_eq!(find_backend("emulator"), Some("dummy"));

        let (primary, system) = open_backend(Some("dummy"), Variant::St25dv16k).unwrap();
        let device = Device::attach(
            primary,
            system,
            DeviceConfig::new().with_variant(Variant::St25dv16k),
        );
        // The emulator was sized from the global variant
        assert_eq!(device.write(AreaId::User, 1999, &[0xAA]).unwrap(), 1);
        let (count, data) = device.read_to_vec(AreaId::User, 1999, 1).unwrap();
        assert_eq!((count, data), (1, vec![0xAA]));
    }

    #[cfg(feature = "dummy")]
    #[test]
    fn test_dummy_backend_rejects_bad_options() {
        assert!(matches!(
            open_backend(Some("dummy:variant=2k"), Variant::St25dv04k),
            Err(BackendError::InvalidOptions { backend: "dummy", .. })
        ));
    }

    #[cfg(feature = "linux-i2c")]
    #[test]
    fn test_linux_i2c_requires_device() {
        assert!(matches!(
            open_backend(Some("linux_i2c"), Variant::St25dv04k),
            Err(BackendError::InvalidOptions { .. })
        ));
    }
}
