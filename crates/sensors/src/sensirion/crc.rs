use crc::{Algorithm, Crc};

use crate::Error;

/// CRC-8 as used by every Sensirion device: polynomial 0x31, init 0xFF,
/// no reflection, no final xor.
pub const SENSIRION_CRC8: Algorithm<u8> = Algorithm {
    width: 8,
    poly: 0x31,
    init: 0xff,
    refin: false,
    refout: false,
    xorout: 0x00,
    check: 0xf7,
    residue: 0x00,
};

const CRC: Crc<u8> = Crc::<u8>::new(&SENSIRION_CRC8);

#[must_use]
pub fn crc8(data: &[u8]) -> u8 {
    CRC.checksum(data)
}

/// A 16 bit data word as it appears on the wire: big endian, followed by
/// the checksum over those two bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrcWord {
    pub data: [u8; 2],
    pub crc: u8,
}

impl CrcWord {
    #[must_use]
    pub fn new(word: u16) -> Self {
        let data = word.to_be_bytes();
        Self {
            data,
            crc: crc8(&data),
        }
    }

    #[must_use]
    pub fn from_wire(bytes: [u8; 3]) -> Self {
        Self {
            data: [bytes[0], bytes[1]],
            crc: bytes[2],
        }
    }

    #[must_use]
    pub fn to_wire(self) -> [u8; 3] {
        [self.data[0], self.data[1], self.crc]
    }

    pub fn verify(self) -> Result<u16, Error> {
        let calculated = crc8(&self.data);
        if calculated != self.crc {
            return Err(Error::Checksum {
                received: self.crc.into(),
                calculated: calculated.into(),
            });
        }
        Ok(u16::from_be_bytes(self.data))
    }
}
