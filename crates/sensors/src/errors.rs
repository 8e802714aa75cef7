use embedded_hal::i2c::ErrorKind;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("expected {expected} bytes, got {got}")]
    WrongLength { expected: usize, got: usize },
    #[error("frame declares a payload of {0} bytes, must be 28")]
    FrameLength(u16),
    #[error("chip id is {got:#04x}, expected {expected:#04x}")]
    ChipId { got: u8, expected: u8 },
    #[error("no new data after polling {0} times")]
    NoNewData(u8),
    #[error("chip did not return to sleep mode after checking {0} times")]
    NotAsleep(u8),
    #[error("self test reported a malfunction, result word: {0:#06x}")]
    SelfTest(u16),
    #[error(
        "forced recalibration failed, the sensor needs to run for at least \
        3 minutes before it can be recalibrated"
    )]
    Recalibration,
}

/// Caller supplied parameter outside what the device accepts. Always
/// detected before any bus traffic.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RangeError {
    #[error("temperature offset of {0}°C is above the maximum of 374°C")]
    TemperatureOffset(f32),
    #[error("heater temperature of {0}°C is above the maximum of 400°C")]
    HeaterTemperature(u16),
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("bus transfer failed: {0:?}")]
    Bus(ErrorKind),
    #[error("checksum mismatch, received: {received:#06x}, calculated: {calculated:#06x}")]
    Checksum { received: u16, calculated: u16 },
    #[error("malformed response: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("could not read calibration coefficients: {0:?}")]
    Calibration(ErrorKind),
    #[error("parameter out of range: {0}")]
    Range(#[from] RangeError),
    #[error("initialize may only be called once")]
    AlreadyInitialized,
    #[error("sensor was never initialized")]
    NotInitialized,
}

impl Error {
    pub(crate) fn bus(err: impl embedded_hal::i2c::Error) -> Self {
        Self::Bus(err.kind())
    }

    pub(crate) fn calibration(err: impl embedded_hal::i2c::Error) -> Self {
        Self::Calibration(err.kind())
    }
}

/// Running tally of everything that went wrong for one driver. Recovery is
/// automatic, this keeps it observable.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ErrorCounts {
    pub bus: u64,
    pub checksum: u64,
    pub protocol: u64,
    pub calibration: u64,
    pub range: u64,
    pub misuse: u64,
}

impl ErrorCounts {
    pub fn record(&mut self, error: &Error) {
        let counter = match error {
            Error::Bus(_) => &mut self.bus,
            Error::Checksum { .. } => &mut self.checksum,
            Error::Protocol(_) => &mut self.protocol,
            Error::Calibration(_) => &mut self.calibration,
            Error::Range(_) => &mut self.range,
            Error::AlreadyInitialized | Error::NotInitialized => &mut self.misuse,
        };
        *counter += 1;
    }

    #[must_use]
    pub fn total(&self) -> u64 {
        self.bus + self.checksum + self.protocol + self.calibration + self.range + self.misuse
    }
}
