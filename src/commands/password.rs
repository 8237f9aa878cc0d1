//! Password commands implementation

use st25dv_core::bus::I2cEndpoint;
use st25dv_core::password::{I2C_SSO_DYN, I2C_SSO_OPEN};
use st25dv_core::{AreaId, Device};

/// Read the session state from `I2C_SSO_Dyn`
pub fn session_open<E: I2cEndpoint>(device: &Device<E>) -> Result<bool, Box<dyn std::error::Error>> {
    let (count, sso) = device.read_to_vec(AreaId::DynamicRegister, I2C_SSO_DYN, 1)?;
    if count == 0 {
        return Err("Failed to read the I2C_SSO_Dyn register".into());
    }
    Ok(sso[0] & I2C_SSO_OPEN != 0)
}

/// Present the password and report whether the session opened
///
/// `password` is the 64-bit value as printed in the datasheet, most
/// significant byte first.
pub fn run_present<E: I2cEndpoint>(
    device: &Device<E>,
    password: u64,
) -> Result<(), Box<dyn std::error::Error>> {
    device.present_password(&password.to_le_bytes())?;

    if session_open(device)? {
        println!("I2C security session open");
        Ok(())
    } else {
        Err("Password rejected: I2C security session is closed".into())
    }
}

/// Replace the password (the session must already be open)
pub fn run_change<E: I2cEndpoint>(
    device: &Device<E>,
    password: u64,
) -> Result<(), Box<dyn std::error::Error>> {
    device.change_password(&password.to_le_bytes())?;
    println!("I2C password changed");
    Ok(())
}
