//! Devices speaking the Sensirion command protocol, see [`command`].

pub mod command;
pub mod crc;
pub mod scd4x;
pub mod sen5x;

pub use scd4x::Scd4x;
pub use sen5x::Sen5x;
