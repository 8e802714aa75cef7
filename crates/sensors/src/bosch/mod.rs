//! Bosch BME68x: raw registers turned into physical values by the
//! [`calibration`] engine.

pub mod air_quality;
pub mod bme68x;
pub mod calibration;
pub mod heater;
pub mod registers;

pub use bme68x::Bme68x;
