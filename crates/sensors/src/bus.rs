//! Sharing one physical I2C bus between drivers.
//!
//! Every driver gets its own [`BusHandle`]. A handle locks the bus for the
//! duration of a single transfer. Sequences that must not be interleaved
//! with other traffic to the same device (a command write, its settle delay
//! and the response read) are serialized by the driver owning its handle
//! exclusively, transfers to other addresses may happen in between.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use embedded_hal::i2c::{ErrorType, I2c, Operation};

pub struct SharedBus<T>(Arc<Mutex<T>>);

impl<T> SharedBus<T> {
    pub fn new(bus: T) -> Self {
        Self(Arc::new(Mutex::new(bus)))
    }

    pub fn handle(&self) -> BusHandle<T> {
        BusHandle(Arc::clone(&self.0))
    }
}

pub struct BusHandle<T>(Arc<Mutex<T>>);

impl<T> BusHandle<T> {
    fn lock(&self) -> MutexGuard<'_, T> {
        // poisoned only by a panic in another driver, the bus itself is fine
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> Clone for BusHandle<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T: ErrorType> ErrorType for BusHandle<T> {
    type Error = T::Error;
}

impl<T: I2c> I2c for BusHandle<T> {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        self.lock().transaction(address, operations)
    }

    fn read(&mut self, address: u8, read: &mut [u8]) -> Result<(), Self::Error> {
        self.lock().read(address, read)
    }

    fn write(&mut self, address: u8, write: &[u8]) -> Result<(), Self::Error> {
        self.lock().write(address, write)
    }

    fn write_read(
        &mut self,
        address: u8,
        write: &[u8],
        read: &mut [u8],
    ) -> Result<(), Self::Error> {
        self.lock().write_read(address, write, read)
    }
}
