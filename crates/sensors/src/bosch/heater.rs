use super::calibration::Coefficients;
use crate::{Error, RangeError};

/// Hottest the heater plate may be driven, in °C
pub const MAX_TEMPERATURE: u16 = 400;
pub const DEFAULT_TEMPERATURE: u16 = 320;
/// ms
pub const DEFAULT_DURATION: u16 = 150;

impl Coefficients {
    /// Register value making the heater reach `target` °C given the
    /// current ambient temperature in whole °C.
    pub fn heater_resistance_code(&self, target: u16, ambient: i32) -> Result<u8, Error> {
        if target > MAX_TEMPERATURE {
            return Err(RangeError::HeaterTemperature(target).into());
        }

        let target = i32::from(target);
        let var1 = ((ambient * i32::from(self.gh3)) / 1000) * 256;
        let var2 = (i32::from(self.gh1) + 784)
            * ((((i32::from(self.gh2) + 154_009) * target * 5) / 100 + 3_276_800) / 10);
        let var3 = var1 + var2 / 2;
        let var4 = var3 / (i32::from(self.res_heat_range) + 4);
        let var5 = 131 * i32::from(self.res_heat_val) + 65536;
        let code_x100 = (var4 / var5 - 250) * 34;
        Ok(((code_x100 + 50) / 100) as u8)
    }
}

/// Packs a heating duration into 6 bits of mantissa and 2 bits counting how
/// often the mantissa was divided by four. Saturates at 4032 ms.
#[must_use]
pub fn heater_duration_code(ms: u16) -> u8 {
    if ms >= 0xfc0 {
        return 0xff;
    }

    let mut duration = ms;
    let mut factor = 0u8;
    while duration > 0x3f {
        duration /= 4;
        factor += 1;
    }
    duration as u8 + factor * 64
}
