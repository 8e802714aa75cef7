//! The command layer shared by Sensirion devices.
//!
//! A request is a big endian 16 bit opcode, optionally followed by one
//! argument word with its checksum. A response is a sequence of data words,
//! each followed by its checksum. The device needs time to act on a command
//! before it can be read, every [`Command`] carries that settle delay.

use core::time::Duration;

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use tracing::trace;

use super::crc::CrcWord;
use crate::{Error, ProtocolError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Command {
    pub opcode: u16,
    /// number of data words in the response, zero for write only commands
    pub response_words: usize,
    /// minimum wait after sending before the response may be read
    pub delay: Duration,
    pub description: &'static str,
}

impl Command {
    #[must_use]
    pub const fn new(
        opcode: u16,
        description: &'static str,
        delay_ms: u64,
        response_words: usize,
    ) -> Self {
        Self {
            opcode,
            response_words,
            delay: Duration::from_millis(delay_ms),
            description,
        }
    }

    #[must_use]
    pub fn response_len(&self) -> usize {
        self.response_words * 3
    }

    #[must_use]
    pub fn delay_ms(&self) -> u32 {
        u32::try_from(self.delay.as_millis()).unwrap_or(u32::MAX)
    }
}

/// The request bytes: opcode plus, if given, the argument word and its
/// checksum.
#[must_use]
pub fn encode(command: &Command, argument: Option<u16>) -> Vec<u8> {
    let mut frame = command.opcode.to_be_bytes().to_vec();
    if let Some(argument) = argument {
        frame.extend_from_slice(&CrcWord::new(argument).to_wire());
    }
    frame
}

/// Splits a response into its words. A single bad checksum rejects the
/// whole response, partial results are never returned.
pub fn decode(response: &[u8], expected_words: usize) -> Result<Vec<u16>, Error> {
    if response.len() != expected_words * 3 {
        return Err(ProtocolError::WrongLength {
            expected: expected_words * 3,
            got: response.len(),
        }
        .into());
    }

    response
        .chunks_exact(3)
        .map(|chunk| CrcWord::from_wire([chunk[0], chunk[1], chunk[2]]).verify())
        .collect()
}

/// A Sensirion device at one address on the bus.
pub struct Device<I> {
    bus: I,
    address: u8,
}

impl<I: I2c> Device<I> {
    pub fn new(bus: I, address: u8) -> Self {
        Self { bus, address }
    }

    #[must_use]
    pub fn address(&self) -> u8 {
        self.address
    }

    /// Sends the command, waits its settle delay then reads and verifies the
    /// response. Holding `&mut self` throughout keeps other users of this
    /// device from slipping in between the write and the read.
    pub fn execute(
        &mut self,
        delay: &mut impl DelayNs,
        command: &Command,
        argument: Option<u16>,
    ) -> Result<Vec<u16>, Error> {
        let request = encode(command, argument);
        trace!(
            "sending '{}' ({:#06x}) to {:#04x}",
            command.description,
            command.opcode,
            self.address
        );
        self.bus
            .write(self.address, &request)
            .map_err(Error::bus)?;
        settle(delay, command);

        if command.response_words == 0 {
            return Ok(Vec::new());
        }

        let mut response = vec![0u8; command.response_len()];
        self.bus
            .read(self.address, &mut response)
            .map_err(Error::bus)?;
        decode(&response, command.response_words)
    }

    /// Like [`execute`](Self::execute) for commands with exactly one
    /// response word.
    pub fn query(
        &mut self,
        delay: &mut impl DelayNs,
        command: &Command,
        argument: Option<u16>,
    ) -> Result<u16, Error> {
        let words = self.execute(delay, command, argument)?;
        words.first().copied().ok_or(
            ProtocolError::WrongLength {
                expected: 3,
                got: 0,
            }
            .into(),
        )
    }
}

fn settle(delay: &mut impl DelayNs, command: &Command) {
    let ms = command.delay_ms();
    if ms > 0 {
        delay.delay_ms(ms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GET_ALTITUDE: Command = Command::new(0x2322, "get sensor altitude", 1, 1);
    const SET_ALTITUDE: Command = Command::new(0x2427, "set sensor altitude", 1, 0);

    #[test]
    fn encode_without_argument() {
        assert_eq!(encode(&GET_ALTITUDE, None).as_slice(), &[0x23, 0x22]);
    }

    #[test]
    fn encode_with_argument() {
        assert_eq!(
            encode(&SET_ALTITUDE, Some(0x01f4)).as_slice(),
            &[0x24, 0x27, 0x01, 0xf4, 0x33]
        );
    }

    #[test]
    fn decode_three_words() {
        let response = [0x01, 0xf4, 0x33, 0xbe, 0xef, 0x92, 0x00, 0x00, 0x81];
        assert_eq!(decode(&response, 3), Ok(vec![0x01f4, 0xbeef, 0x0000]));
    }

    #[test]
    fn decode_accepts_what_devices_send() {
        let words: Vec<u16> = (0..=u16::MAX).step_by(257).collect();
        let response: Vec<u8> = words
            .iter()
            .flat_map(|word| CrcWord::new(*word).to_wire())
            .collect();
        assert_eq!(decode(&response, words.len()), Ok(words));
    }

    #[test]
    fn encoded_argument_decodes_to_itself() {
        for argument in [0x0000, 0x01f4, 0x8000, 0xbeef, 0xffff] {
            let frame = encode(&SET_ALTITUDE, Some(argument));
            assert_eq!(decode(&frame[2..], 1), Ok(vec![argument]));
        }
    }

    #[test]
    fn one_bad_checksum_rejects_everything() {
        let response = [0x01, 0xf4, 0x33, 0xbe, 0xef, 0x93, 0x00, 0x00, 0x81];
        assert_eq!(
            decode(&response, 3),
            Err(Error::Checksum {
                received: 0x93,
                calculated: 0x92
            })
        );
    }

    #[test]
    fn decode_checks_length() {
        assert_eq!(
            decode(&[0x01, 0xf4, 0x33, 0xbe], 1),
            Err(ProtocolError::WrongLength {
                expected: 3,
                got: 4
            }
            .into())
        );
    }
}
