//! I2C password protocol
//!
//! Privileged writes (system configuration, password changes) require an
//! open I2C security session. A session is opened by presenting the 64-bit
//! password; while it is open the password can be changed.
//!
//! Both commands use the same 19-byte frame written to the password register
//! through the system endpoint:
//!
//! ```text
//!  0    1    2 .. 9          10    11 .. 18
//! 0x09 0x00  password (MSB)  cmd   password (MSB)
//! ```
//!
//! The secret is supplied least significant byte first and appears twice in
//! the frame, most significant byte first. The chip only honours the command
//! when both copies agree.

use crate::bus::I2cEndpoint;
use crate::error::{Error, Result};
use crate::transaction;

/// Register address of the I2C password
pub const PASSWORD_REG: u16 = 0x0900;

/// Length of the password in bytes
pub const PASSWORD_LEN: usize = 8;

/// Length of a password command frame
pub const FRAME_LEN: usize = 19;

/// Frame position of the command byte
pub const CMD_POS: usize = 10;

/// Dynamic register offset of `I2C_SSO_Dyn`
pub const I2C_SSO_DYN: u16 = 0x0004;

/// `I2C_SSO_Dyn` bit set while the security session is open
pub const I2C_SSO_OPEN: u8 = 0x01;

const FIRST_COPY: usize = 2;
const SECOND_COPY: usize = CMD_POS + 1;

/// Password register commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PasswordCommand {
    /// Open the I2C security session
    Present = 0x09,
    /// Replace the password (session must be open)
    Change = 0x07,
}

impl PasswordCommand {
    /// Command code placed at [`CMD_POS`]
    pub const fn code(self) -> u8 {
        self as u8
    }
}

/// Build the command frame for `cmd`
pub fn build_frame(cmd: PasswordCommand, secret: &[u8; PASSWORD_LEN]) -> [u8; FRAME_LEN] {
    let mut frame = [0u8; FRAME_LEN];
    frame[..FIRST_COPY].copy_from_slice(&PASSWORD_REG.to_be_bytes());
    frame[CMD_POS] = cmd.code();
    for (i, &byte) in secret.iter().rev().enumerate() {
        frame[FIRST_COPY + i] = byte;
        frame[SECOND_COPY + i] = byte;
    }
    frame
}

/// Validate `secret` and send `cmd` through the system endpoint
///
/// Input that is not exactly [`PASSWORD_LEN`] bytes long is rejected before
/// any bus activity.
pub fn send<E: I2cEndpoint + ?Sized>(
    endpoint: &mut E,
    cmd: PasswordCommand,
    secret: &[u8],
) -> Result<()> {
    let secret: &[u8; PASSWORD_LEN] = secret
        .try_into()
        .map_err(|_| Error::InvalidPasswordLength(secret.len()))?;

    log::debug!("st25dv: sending password command 0x{:02X}", cmd.code());
    let frame = build_frame(cmd, secret);
    transaction::send_frame(endpoint, &frame)
}
