//! The 32 byte frame sent by Plantower particulate sensors.
//!
//! ```text
//! 0..2    start characters 0x42 0x4d
//! 2..4    payload length, always 28
//! 4..28   twelve big endian u16 data fields
//! 28..30  reserved
//! 30..32  sum of bytes 0..30, big endian
//! ```

use crate::{Error, ProtocolError};

pub const FRAME_LEN: usize = 32;
pub const PAYLOAD_LEN: u16 = 28;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Frame {
    /// µg/m³, standard particle (CF=1)
    pub pm1_0_standard: u16,
    pub pm2_5_standard: u16,
    pub pm10_standard: u16,
    /// µg/m³, under atmospheric environment
    pub pm1_0_environmental: u16,
    pub pm2_5_environmental: u16,
    pub pm10_environmental: u16,
    /// particles beyond the given diameter in 0.1 liter of air
    pub particles_0_3um: u16,
    pub particles_0_5um: u16,
    pub particles_1_0um: u16,
    pub particles_2_5um: u16,
    pub particles_5_0um: u16,
    pub particles_10um: u16,
}

fn be_u16(bytes: &[u8], at: usize) -> u16 {
    u16::from_be_bytes([bytes[at], bytes[at + 1]])
}

#[must_use]
pub fn checksum(frame: &[u8; FRAME_LEN]) -> u16 {
    frame[..30]
        .iter()
        .fold(0u16, |sum, b| sum.wrapping_add(u16::from(*b)))
}

impl Frame {
    /// Validates and extracts a frame. The length field is checked before
    /// the checksum.
    pub fn decode(bytes: &[u8]) -> Result<Self, Error> {
        let bytes: &[u8; FRAME_LEN] =
            bytes.try_into().map_err(|_| ProtocolError::WrongLength {
                expected: FRAME_LEN,
                got: bytes.len(),
            })?;

        let declared = be_u16(bytes, 2);
        if declared != PAYLOAD_LEN {
            return Err(ProtocolError::FrameLength(declared).into());
        }

        let received = be_u16(bytes, 30);
        let calculated = checksum(bytes);
        if received != calculated {
            return Err(Error::Checksum {
                received,
                calculated,
            });
        }

        let field = |i: usize| be_u16(bytes, 4 + 2 * i);
        Ok(Self {
            pm1_0_standard: field(0),
            pm2_5_standard: field(1),
            pm10_standard: field(2),
            pm1_0_environmental: field(3),
            pm2_5_environmental: field(4),
            pm10_environmental: field(5),
            particles_0_3um: field(6),
            particles_0_5um: field(7),
            particles_1_0um: field(8),
            particles_2_5um: field(9),
            particles_5_0um: field(10),
            particles_10um: field(11),
        })
    }
}

/// Keeps the fields of the last valid frame. A rejected frame leaves them
/// untouched.
#[derive(Debug, Default)]
pub struct Decoder {
    fields: Option<Frame>,
}

impl Decoder {
    pub fn feed(&mut self, bytes: &[u8]) -> Result<Frame, Error> {
        let frame = Frame::decode(bytes)?;
        self.fields = Some(frame);
        Ok(frame)
    }

    #[must_use]
    pub fn fields(&self) -> Option<&Frame> {
        self.fields.as_ref()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn encode(fields: [u16; 12]) -> [u8; FRAME_LEN] {
        let mut frame = [0u8; FRAME_LEN];
        frame[0] = 0x42;
        frame[1] = 0x4d;
        frame[2..4].copy_from_slice(&PAYLOAD_LEN.to_be_bytes());
        for (i, field) in fields.iter().enumerate() {
            frame[4 + 2 * i..6 + 2 * i].copy_from_slice(&field.to_be_bytes());
        }
        let sum = checksum(&frame);
        frame[30..].copy_from_slice(&sum.to_be_bytes());
        frame
    }

    const FIELDS: [u16; 12] = [3, 5, 7, 4, 6, 9, 1200, 350, 80, 12, 3, 1];

    #[test]
    fn valid_frame() {
        let frame = Frame::decode(&encode(FIELDS)).unwrap();
        assert_eq!(frame.pm1_0_standard, 3);
        assert_eq!(frame.pm10_standard, 7);
        assert_eq!(frame.pm2_5_environmental, 6);
        assert_eq!(frame.particles_0_3um, 1200);
        assert_eq!(frame.particles_10um, 1);
    }

    #[test]
    fn length_checked_before_checksum() {
        let mut bytes = encode(FIELDS);
        bytes[3] = 20;
        bytes[31] ^= 0xff;
        assert_eq!(
            Frame::decode(&bytes),
            Err(ProtocolError::FrameLength(20).into())
        );
    }

    #[test]
    fn bad_checksum_keeps_previous_fields() {
        let mut decoder = Decoder::default();
        decoder.feed(&encode(FIELDS)).unwrap();

        let mut corrupt = encode([99; 12]);
        corrupt[31] = corrupt[31].wrapping_add(1);
        let err = decoder.feed(&corrupt).unwrap_err();
        assert!(matches!(err, Error::Checksum { .. }));
        assert_eq!(decoder.fields().unwrap().pm1_0_standard, 3);
    }

    #[test]
    fn short_buffer() {
        assert_eq!(
            Frame::decode(&[0x42, 0x4d, 0x00]),
            Err(ProtocolError::WrongLength {
                expected: 32,
                got: 3
            }
            .into())
        );
    }
}
