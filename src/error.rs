use thiserror::Error;

use crate::DeviceId;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Couldn't initialize hidapi: {0}")]
    SubsystemInit(#[source] hidapi::HidError),

    #[error("Couldn't open device {0}")]
    DeviceNotFound(DeviceId),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("No device open")]
    NotOpen,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
