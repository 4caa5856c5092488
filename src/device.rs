use retry::{delay::Fixed, retry_with_index, OperationResult};

use crate::{DeviceId, Error, Result, Status, MAX_TRY, REPORT_SIZE};

pub use hidapi::MAX_REPORT_DESCRIPTOR_SIZE;

/// An initialized HID subsystem. Dropping it releases the subsystem.
pub trait Backend {
    type Device: FeatureDevice;

    fn open(&mut self, id: DeviceId) -> Result<Self::Device>;
}

/// The handful of calls we need from an open HID device. Each returns the
/// number of bytes the transport moved.
pub trait FeatureDevice {
    fn send_feature_report(&mut self, buf: &[u8]) -> Result<usize>;
    fn get_feature_report(&mut self, buf: &mut [u8]) -> Result<usize>;
    fn get_report_descriptor(&mut self, buf: &mut [u8]) -> Result<usize>;
}

pub struct HidapiBackend {
    api: hidapi::HidApi,
}

impl HidapiBackend {
    pub fn new() -> Result<Self> {
        let api = hidapi::HidApi::new().map_err(Error::SubsystemInit)?;
        Ok(HidapiBackend { api })
    }
}

impl Backend for HidapiBackend {
    type Device = hidapi::HidDevice;

    fn open(&mut self, id: DeviceId) -> Result<hidapi::HidDevice> {
        // the receiver exposes several interfaces under the same vid/pid
        let info = self
            .api
            .device_list()
            .filter(|dev| dev.vendor_id() == id.vendor_id && dev.product_id() == id.product_id)
            .filter(|dev| dev.interface_number() == id.interface)
            .last()
            .ok_or(Error::DeviceNotFound(id))?;

        tracing::debug!("Opening {:?}", info.path());
        info.open_device(&self.api).map_err(|err| {
            tracing::debug!("Error opening device: {}", err);
            Error::DeviceNotFound(id)
        })
    }
}

impl FeatureDevice for hidapi::HidDevice {
    fn send_feature_report(&mut self, buf: &[u8]) -> Result<usize> {
        // hidapi only reports failure here, never a partial write, so the
        // session's length check can't trip on real hardware
        hidapi::HidDevice::send_feature_report(self, buf)
            .map(|()| buf.len())
            .map_err(|e| Error::Io(format!("Couldn't send feature report: {}", e)))
    }

    fn get_feature_report(&mut self, buf: &mut [u8]) -> Result<usize> {
        hidapi::HidDevice::get_feature_report(self, buf)
            .map_err(|e| Error::Io(format!("Couldn't get feature report: {}", e)))
    }

    fn get_report_descriptor(&mut self, buf: &mut [u8]) -> Result<usize> {
        hidapi::HidDevice::get_report_descriptor(self, buf)
            .map_err(|e| Error::Io(format!("Couldn't get descriptor report: {}", e)))
    }
}

/// Owns the HID subsystem and at most one open device.
///
/// The device handle is closed before the subsystem is released, whichever
/// way the session goes out of scope.
pub struct Session<B: Backend> {
    // declared first so it is dropped before the backend
    device: Option<B::Device>,
    backend: B,
}

enum Poll {
    Unanswered,
    Failed(Error),
}

impl<B: Backend> Session<B> {
    pub fn new(backend: B) -> Self {
        Session {
            device: None,
            backend,
        }
    }

    pub fn open(&mut self, id: DeviceId) -> Result<()> {
        self.close();
        self.device = Some(self.backend.open(id)?);
        tracing::debug!("Opened {}", id);
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.device.is_some()
    }

    fn close(&mut self) {
        if self.device.take().is_some() {
            tracing::debug!("Closed device");
        }
    }

    fn device(&mut self) -> Result<&mut B::Device> {
        self.device.as_mut().ok_or(Error::NotOpen)
    }

    pub fn send_feature_report(&mut self, buf: &[u8]) -> Result<()> {
        let sent = self.device()?.send_feature_report(buf)?;
        if sent != buf.len() {
            return Err(Error::Io(format!(
                "Couldn't send feature report: {} of {} bytes written",
                sent,
                buf.len()
            )));
        }
        Ok(())
    }

    pub fn get_feature_report(&mut self, buf: &mut [u8]) -> Result<()> {
        let read = self.device()?.get_feature_report(buf)?;
        if read != buf.len() {
            return Err(Error::Io(format!(
                "Couldn't get feature report: {} of {} bytes read",
                read,
                buf.len()
            )));
        }
        Ok(())
    }

    pub fn report_descriptor(&mut self) -> Result<Vec<u8>> {
        let mut descriptor = vec![0u8; MAX_REPORT_DESCRIPTOR_SIZE];
        let len = self.device()?.get_report_descriptor(&mut descriptor)?;
        descriptor.truncate(len);
        tracing::debug!("Report descriptor is {} bytes", len);
        Ok(descriptor)
    }

    /// Asks the receiver for the peripheral's battery status.
    ///
    /// The receiver only answers once the peripheral is awake, so the request
    /// is repeated up to `MAX_TRY` times. A peripheral that never answers is
    /// reported as asleep rather than as an error; transport failures abort
    /// straight away.
    pub fn poll_status(&mut self) -> Result<Status> {
        let request = crate::status_request();

        let polled = retry_with_index(
            Fixed::from_millis(0).take(MAX_TRY - 1),
            |attempt| -> OperationResult<Status, Poll> {
                let mut response = [0u8; REPORT_SIZE];
                if let Err(err) = self.exchange(&request, &mut response) {
                    return OperationResult::Err(Poll::Failed(err));
                }
                match Status::from_response(&response) {
                    Some(status) => {
                        tracing::debug!("Status reply on attempt {}", attempt);
                        OperationResult::Ok(status)
                    }
                    None => {
                        tracing::trace!(
                            "Attempt {}: no status reply ({:02x?})",
                            attempt,
                            &response[..9]
                        );
                        OperationResult::Retry(Poll::Unanswered)
                    }
                }
            },
        );

        match polled {
            Ok(status) => Ok(status),
            Err(retry::Error {
                error: Poll::Failed(err),
                ..
            }) => Err(err),
            Err(retry::Error {
                error: Poll::Unanswered,
                ..
            }) => {
                tracing::debug!("No status reply after {} attempts, assuming asleep", MAX_TRY);
                Ok(Status::asleep())
            }
        }
    }

    fn exchange(&mut self, request: &[u8], response: &mut [u8]) -> Result<()> {
        self.send_feature_report(request)?;
        response.fill(0);
        self.get_feature_report(response)
    }
}

impl<B: Backend> Drop for Session<B> {
    fn drop(&mut self) {
        self.close();
    }
}
