//! Exclusive, shareable accelerator handle
//!
//! The register protocol supports one outstanding `start`. [`Accelerator`]
//! wraps the driver in a mutex so any number of threads can hold a handle
//! while the write → start → wait → read sequence of each caller runs
//! uninterrupted.

use crate::backend::{select_backend, BackendType, RegisterBus};
use crate::config::DriverConfig;
use crate::driver::ConvDriver;
use crate::error::Result;
use conv_chip::kernel::{Weights, Window};
use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;
use std::time::Duration;

/// Cloneable handle to one accelerator instance
#[derive(Debug)]
pub struct Accelerator<B: RegisterBus> {
    driver: Arc<Mutex<ConvDriver<B>>>,
    poll_timeout: Option<Duration>,
}

impl<B: RegisterBus> Clone for Accelerator<B> {
    fn clone(&self) -> Self {
        Self {
            driver: Arc::clone(&self.driver),
            poll_timeout: self.poll_timeout,
        }
    }
}

impl Accelerator<Box<dyn RegisterBus>> {
    /// Open the backend named in `config` and apply its poll timeout
    ///
    /// # Errors
    ///
    /// Returns error if the selected backend cannot be opened.
    pub fn open(config: &DriverConfig) -> Result<Self> {
        let bus = select_backend(config.backend, config)?;
        tracing::info!("Accelerator opened on {} backend", bus.backend_type());
        Ok(Self::new(bus, config.poll_timeout))
    }
}

impl<B: RegisterBus> Accelerator<B> {
    /// Take ownership of `bus`; `poll_timeout` of `None` waits forever
    pub fn new(bus: B, poll_timeout: Option<Duration>) -> Self {
        Self {
            driver: Arc::new(Mutex::new(ConvDriver::new(bus))),
            poll_timeout,
        }
    }

    /// Bound applied to every wait
    pub const fn poll_timeout(&self) -> Option<Duration> {
        self.poll_timeout
    }

    /// Backend in use
    pub fn backend_type(&self) -> BackendType {
        self.driver.lock().backend_type()
    }

    /// Exclusive access for step-wise protocol use
    ///
    /// Nobody else can start a computation while the guard is alive.
    pub fn lock(&self) -> MutexGuard<'_, ConvDriver<B>> {
        self.driver.lock()
    }

    /// Run one convolution under the lock
    ///
    /// # Errors
    ///
    /// Returns `ConvError::Timeout` if a poll timeout is configured and the
    /// accelerator does not finish in time.
    pub fn convolve(&self, window: &Window, weights: &Weights) -> Result<i16> {
        let mut driver = self.driver.lock();
        match self.poll_timeout {
            Some(timeout) => driver.convolve_with_timeout(window, weights, timeout),
            None => Ok(driver.convolve(window, weights)),
        }
    }
}
