//! Device session, owner of the opened device handle

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{debug, info, warn};

use super::{DeviceConfig, DeviceError, DeviceHandle, MotorBus, ProtocolStackSettings};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Owns the device driver and, once opened, the handle to the device.
///
/// The session is open if and only if it holds a handle, in which case the
/// last error code is zero.
pub struct DeviceSession<B: MotorBus> {
    bus: B,

    handle: Option<DeviceHandle>,

    config: Option<DeviceConfig>,

    last_error_code: u32,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Errors which can occur while opening a [`DeviceSession`].
#[derive(Debug, thiserror::Error)]
pub enum DeviceOpenError {
    #[error("The device session is already open")]
    AlreadyOpen,

    #[error("Could not open the device: {0}")]
    OpenFailed(DeviceError),

    #[error("Could not read the protocol stack settings: {0}")]
    GetSettingsFailed(DeviceError),

    #[error("Could not write the protocol stack settings: {0}")]
    SetSettingsFailed(DeviceError),

    #[error("Requested a baud rate of {requested} but the device reports {actual}")]
    BaudRateMismatch { requested: u32, actual: u32 },
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl<B: MotorBus> DeviceSession<B> {
    /// Create a closed session around the given driver.
    pub fn new(bus: B) -> Self {
        Self {
            bus,
            handle: None,
            config: None,
            last_error_code: 0,
        }
    }

    /// Open the device and apply the requested baud rate.
    ///
    /// The protocol stack settings are read, the baud rate written, and the
    /// settings read again. The session is only open if the read back baud
    /// rate is the requested one. On any failure the session stays closed.
    pub fn open(&mut self, config: &DeviceConfig) -> Result<(), DeviceOpenError> {
        if self.is_open() {
            return Err(DeviceOpenError::AlreadyOpen);
        }

        info!(
            "Opening device {} ({}, {}, {})",
            config.device_name, config.protocol_stack_name, config.interface_name, config.port_name
        );

        let handle = match self.bus.open_device(
            &config.device_name,
            &config.protocol_stack_name,
            &config.interface_name,
            &config.port_name,
        ) {
            Ok(h) => h,
            Err(e) => {
                self.last_error_code = e.code;
                return Err(DeviceOpenError::OpenFailed(e));
            }
        };

        match self.apply_baud_rate(handle, config.baud_rate) {
            Ok(()) => {
                self.handle = Some(handle);
                self.config = Some(config.clone());
                self.last_error_code = 0;
                info!("Device opened at {} baud", config.baud_rate);
                Ok(())
            }
            Err(e) => {
                warn!("Device configuration failed, releasing the device: {}", e);
                if let Err(close_err) = self.bus.close_device(handle) {
                    warn!("Could not release the device: {}", close_err);
                }
                Err(e)
            }
        }
    }

    /// Release the device handle.
    ///
    /// Closing a session which is not open does nothing. If the release fails
    /// the session stays open.
    pub fn close(&mut self) -> Result<(), DeviceError> {
        let handle = match self.handle {
            Some(h) => h,
            None => return Ok(()),
        };

        info!("Closing device");

        match self.bus.close_device(handle) {
            Ok(()) => {
                self.handle = None;
                self.last_error_code = 0;
                Ok(())
            }
            Err(e) => {
                self.last_error_code = e.code;
                Err(e)
            }
        }
    }

    pub fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    /// Handle to the opened device, `None` if the session is closed.
    pub fn handle(&self) -> Option<DeviceHandle> {
        self.handle
    }

    /// Configuration the session was opened with.
    pub fn config(&self) -> Option<&DeviceConfig> {
        self.config.as_ref()
    }

    /// Error code of the last failed session operation, zero if it succeeded.
    pub fn last_error_code(&self) -> u32 {
        self.last_error_code
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    /// Read, write and re-read the protocol stack settings.
    fn apply_baud_rate(
        &mut self,
        handle: DeviceHandle,
        baud_rate: u32,
    ) -> Result<(), DeviceOpenError> {
        let current = self
            .bus
            .get_protocol_stack_settings(handle)
            .map_err(|e| self.record(DeviceOpenError::GetSettingsFailed(e), e))?;

        debug!(
            "Current protocol stack settings: {} baud, {} ms timeout",
            current.baud_rate, current.timeout_ms
        );

        // Only the baud rate changes, the device's timeout is kept
        let desired = ProtocolStackSettings {
            baud_rate,
            timeout_ms: current.timeout_ms,
        };
        self.bus
            .set_protocol_stack_settings(handle, desired)
            .map_err(|e| self.record(DeviceOpenError::SetSettingsFailed(e), e))?;

        let applied = self
            .bus
            .get_protocol_stack_settings(handle)
            .map_err(|e| self.record(DeviceOpenError::GetSettingsFailed(e), e))?;

        if applied.baud_rate != baud_rate {
            return Err(DeviceOpenError::BaudRateMismatch {
                requested: baud_rate,
                actual: applied.baud_rate,
            });
        }

        Ok(())
    }

    fn record(&mut self, err: DeviceOpenError, device_err: DeviceError) -> DeviceOpenError {
        self.last_error_code = device_err.code;
        err
    }
}

impl<B: MotorBus> Drop for DeviceSession<B> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("Could not close the device on drop: {}", e);
        }
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
