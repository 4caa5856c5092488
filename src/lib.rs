use std::fmt;
use std::io::{self, Write};

mod device;
mod error;

pub use device::{Backend, FeatureDevice, HidapiBackend, Session, MAX_REPORT_DESCRIPTOR_SIZE};
pub use error::{Error, Result};

/// Feature reports are a report id byte followed by 64 bytes of payload.
pub const REPORT_SIZE: usize = 65;

/// How many request/response exchanges to attempt before assuming the
/// peripheral is asleep.
pub const MAX_TRY: usize = 32;

pub type Report = [u8; REPORT_SIZE];

/// The wireless receiver answers status queries on its third HID interface.
pub const WIRELESS_RECEIVER: DeviceId = DeviceId {
    vendor_id: 0x36a7,
    product_id: 0xa885,
    interface: 2,
};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct DeviceId {
    pub vendor_id: u16,
    pub product_id: u16,
    pub interface: i32,
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04x}:{:04x} (interface {})",
            self.vendor_id, self.product_id, self.interface
        )
    }
}

// status request is 00 00 00 02 02 00 83, zero padded to REPORT_SIZE
// 00 = report id (unused by the receiver)
// 83 = status command, echoed back at the same offset
const STATUS_REQUEST: [u8; 7] = [0x00, 0x00, 0x00, 0x02, 0x02, 0x00, 0x83];

// a status reply carries A1 at byte 1 and echoes the command at byte 6
const REPLY_TAG: (usize, u8) = (1, 0xa1);
const REPLY_COMMAND: (usize, u8) = (6, 0x83);
const CHARGING_OFFSET: usize = 7;
const POWER_OFFSET: usize = 8;

pub fn status_request() -> Report {
    let mut buf = [0u8; REPORT_SIZE];
    buf[..STATUS_REQUEST.len()].copy_from_slice(&STATUS_REQUEST);
    buf
}

/// Battery state of the peripheral as reported by the receiver.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Status {
    pub sleeping: bool,
    pub charging: bool,
    /// Battery level in percent, exactly as the device reported it. Nothing
    /// stops a misbehaving device from reporting more than 100.
    pub power: u8,
}

impl Status {
    /// What we report when the peripheral never answered.
    pub fn asleep() -> Self {
        Self {
            sleeping: true,
            charging: false,
            power: 0,
        }
    }

    /// Decodes a feature report read back from the receiver.
    ///
    /// Returns `None` unless the report is tagged as a status reply; the
    /// receiver hands out stale or unrelated reports while the peripheral is
    /// waking up, so an untagged report is not an error.
    pub fn from_response(buf: &[u8]) -> Option<Self> {
        if buf.len() <= POWER_OFFSET {
            return None;
        }
        if buf[REPLY_TAG.0] != REPLY_TAG.1 || buf[REPLY_COMMAND.0] != REPLY_COMMAND.1 {
            return None;
        }

        Some(Self {
            sleeping: false,
            charging: buf[CHARGING_OFFSET] != 0,
            power: buf[POWER_OFFSET],
        })
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Sleep: {}", yes_no(self.sleeping))?;
        writeln!(f, "Charging: {}", yes_no(self.charging))?;
        write!(f, "Power: {}%", self.power)
    }
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}

/// Prints the status either as the three line summary or, for scripts, as the
/// bare percentage.
pub fn write_status<W: Write>(out: &mut W, status: &Status, power_only: bool) -> io::Result<()> {
    if power_only {
        writeln!(out, "{}", status.power)
    } else {
        writeln!(out, "{}", status)
    }
}

pub fn write_descriptor<W: Write>(out: &mut W, descriptor: &[u8]) -> io::Result<()> {
    writeln!(out, "Report Descriptor: ({} bytes)", descriptor.len())?;
    out.write_all(hexdump(descriptor, 10).as_bytes())
}

fn hexdump(data: &[u8], chunk_size: usize) -> String {
    let mut lines = String::new();
    for chunk in data.chunks(chunk_size) {
        let hex_part: Vec<String> = chunk.iter().map(|byte| format!("0x{:02x}", byte)).collect();
        lines.push_str(&hex_part.join(" "));
        lines.push('\n');
    }
    lines
}
