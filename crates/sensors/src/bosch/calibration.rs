//! Factory calibration of the BME68x and the fixed-point compensation
//! turning raw ADC counts into physical values.
//!
//! The arithmetic mirrors the integer pipeline of the Bosch reference
//! driver bit for bit. Intermediate results that overflow 32 bits there
//! wrap here too.

use super::registers::COEFF_LEN;

/// Chip variant, decides which gas resistance formula applies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    /// BME680
    GasLow,
    /// BME688
    GasHigh,
}

impl Variant {
    #[must_use]
    pub fn from_id(id: u8) -> Self {
        if id == 0 {
            Variant::GasLow
        } else {
            Variant::GasHigh
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Coefficients {
    pub t1: u16,
    pub t2: i16,
    pub t3: i8,

    pub p1: u16,
    pub p2: i16,
    pub p3: i8,
    pub p4: i16,
    pub p5: i16,
    pub p6: i8,
    pub p7: i8,
    pub p8: i16,
    pub p9: i16,
    pub p10: u8,

    pub h1: u16,
    pub h2: u16,
    pub h3: i8,
    pub h4: i8,
    pub h5: i8,
    pub h6: u8,
    pub h7: i8,

    pub gh1: i8,
    pub gh2: i16,
    pub gh3: i8,

    pub res_heat_range: u8,
    pub res_heat_val: i8,
    pub range_sw_err: i8,
}

/// Fine resolution temperature. Only [`Coefficients::compute_temperature`]
/// makes these, pressure and humidity of a cycle need the one from that
/// same cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TFine(pub(crate) i32);

impl TFine {
    #[must_use]
    pub fn value(self) -> i32 {
        self.0
    }
}

const LOOKUP_K1_RANGE: [i64; 16] = [
    2147483647, 2147483647, 2147483647, 2147483647, 2147483647, 2126008810, 2147483647,
    2130303777, 2147483647, 2147483647, 2143188679, 2136746228, 2147483647, 2126008810,
    2147483647, 2147483647,
];

const LOOKUP_K2_RANGE: [i64; 16] = [
    4096000000, 2048000000, 1024000000, 512000000, 255744255, 127110228, 64000000, 32258064,
    16016016, 8000000, 4000000, 2000000, 1000000, 500000, 250000, 125000,
];

/// `262144 >> range`, the gas high variant scales by powers of two only
const LOOKUP_HIGH_RANGE: [u32; 16] = {
    let mut table = [0u32; 16];
    let mut i = 0;
    while i < 16 {
        table[i] = 262144 >> i;
        i += 1;
    }
    table
};

impl Coefficients {
    /// Unpacks the concatenated coefficient ranges. Multi byte values are
    /// little endian except for the nibble packed H1 and H2.
    #[must_use]
    pub fn parse(b: &[u8; COEFF_LEN]) -> Self {
        let u16_at = |i: usize| u16::from_le_bytes([b[i], b[i + 1]]);
        let i16_at = |i: usize| i16::from_le_bytes([b[i], b[i + 1]]);
        let i8_at = |i: usize| b[i] as i8;

        Self {
            t1: u16_at(31),
            t2: i16_at(0),
            t3: i8_at(2),

            p1: u16_at(4),
            p2: i16_at(6),
            p3: i8_at(8),
            p4: i16_at(10),
            p5: i16_at(12),
            p6: i8_at(15),
            p7: i8_at(14),
            p8: i16_at(18),
            p9: i16_at(20),
            p10: b[22],

            h1: (u16::from(b[25]) << 4) | u16::from(b[24] & 0x0f),
            h2: (u16::from(b[23]) << 4) | u16::from(b[24] >> 4),
            h3: i8_at(26),
            h4: i8_at(27),
            h5: i8_at(28),
            h6: b[29],
            h7: i8_at(30),

            gh1: i8_at(35),
            gh2: i16_at(33),
            gh3: i8_at(36),

            res_heat_val: i8_at(37),
            res_heat_range: (b[39] & 0x30) >> 4,
            range_sw_err: ((b[41] & 0xf0) as i8) / 16,
        }
    }

    /// Returns the temperature in 0.01 °C together with the fine
    /// temperature the other compensations need.
    #[must_use]
    pub fn compute_temperature(&self, adc: u32) -> (i16, TFine) {
        let var1 = (i64::from(adc) >> 3) - (i64::from(self.t1) << 1);
        let var2 = (var1 * i64::from(self.t2)) >> 11;
        let var3 = ((var1 >> 1) * (var1 >> 1)) >> 12;
        let var3 = (var3 * (i64::from(self.t3) << 4)) >> 14;
        let t_fine = (var2 + var3) as i32;
        let temperature = ((i64::from(t_fine) * 5 + 128) >> 8) as i16;
        (temperature, TFine(t_fine))
    }

    /// Pressure in Pa. Returns 0 if the coefficients are degenerate.
    #[must_use]
    pub fn compute_pressure(&self, adc: u32, t_fine: TFine) -> u32 {
        const OVERFLOW_CHECK: i32 = 1 << 30;

        let p1 = i32::from(self.p1);
        let p2 = i32::from(self.p2);
        let p3 = i32::from(self.p3);
        let p4 = i32::from(self.p4);
        let p5 = i32::from(self.p5);
        let p6 = i32::from(self.p6);
        let p7 = i32::from(self.p7);
        let p8 = i32::from(self.p8);
        let p9 = i32::from(self.p9);
        let p10 = i32::from(self.p10);

        let mut var1 = (t_fine.0 >> 1) - 64000;
        let square = (var1 >> 2).wrapping_mul(var1 >> 2);
        let mut var2 = (square >> 11).wrapping_mul(p6) >> 2;
        var2 = var2.wrapping_add(var1.wrapping_mul(p5) << 1);
        var2 = (var2 >> 2).wrapping_add(p4 << 16);
        var1 = ((square >> 13).wrapping_mul(p3 << 5) >> 3).wrapping_add(p2.wrapping_mul(var1) >> 1);
        var1 >>= 18;
        var1 = (32768 + var1).wrapping_mul(p1) >> 15;
        if var1 == 0 {
            return 0;
        }

        let mut pressure = 1_048_576i32.wrapping_sub(adc as i32);
        pressure = pressure.wrapping_sub(var2 >> 12).wrapping_mul(3125);
        // both orders are needed to keep precision without overflowing
        pressure = if pressure >= OVERFLOW_CHECK {
            pressure.wrapping_div(var1) << 1
        } else {
            (pressure << 1).wrapping_div(var1)
        };

        let var1 = p9.wrapping_mul((pressure >> 3).wrapping_mul(pressure >> 3) >> 13) >> 12;
        let var2 = (pressure >> 2).wrapping_mul(p8) >> 13;
        let var3 = (pressure >> 8)
            .wrapping_mul(pressure >> 8)
            .wrapping_mul(pressure >> 8)
            .wrapping_mul(p10)
            >> 17;
        pressure = pressure.wrapping_add(
            var1.wrapping_add(var2)
                .wrapping_add(var3)
                .wrapping_add(p7 << 7)
                >> 4,
        );
        pressure as u32
    }

    /// Relative humidity in 0.001 %, always within 0..=100_000
    #[must_use]
    pub fn compute_humidity(&self, adc: u16, t_fine: TFine) -> u32 {
        let h1 = i32::from(self.h1);
        let h2 = i32::from(self.h2);
        let h3 = i32::from(self.h3);
        let h4 = i32::from(self.h4);
        let h5 = i32::from(self.h5);
        let h6 = i32::from(self.h6);
        let h7 = i32::from(self.h7);

        let temp_scaled = t_fine.0.wrapping_mul(5).wrapping_add(128) >> 8;
        let var1 = i32::from(adc)
            .wrapping_sub(h1 * 16)
            .wrapping_sub((temp_scaled.wrapping_mul(h3) / 100) >> 1);
        let var2 = h2.wrapping_mul(
            (temp_scaled.wrapping_mul(h4) / 100)
                .wrapping_add((temp_scaled.wrapping_mul(temp_scaled.wrapping_mul(h5) / 100) >> 6) / 100)
                .wrapping_add(1 << 14),
        ) >> 10;
        let var3 = var1.wrapping_mul(var2);
        let var4 = ((h6 << 7).wrapping_add(temp_scaled.wrapping_mul(h7) / 100)) >> 4;
        let var5 = (var3 >> 14).wrapping_mul(var3 >> 14) >> 10;
        let var6 = var4.wrapping_mul(var5) >> 1;
        let humidity = ((var3.wrapping_add(var6) >> 10).wrapping_mul(1000)) >> 12;
        humidity.clamp(0, 100_000) as u32
    }

    /// Gas resistance in Ω
    #[must_use]
    pub fn gas_resistance(&self, adc: u16, range: u8, variant: Variant) -> u32 {
        let range = usize::from(range & 0x0f);
        match variant {
            Variant::GasLow => self.gas_resistance_low(adc, range),
            Variant::GasHigh => gas_resistance_high(adc, range),
        }
    }

    fn gas_resistance_low(&self, adc: u16, range: usize) -> u32 {
        let var1 =
            ((1340 + 5 * i64::from(self.range_sw_err)) * LOOKUP_K1_RANGE[range]) >> 16;
        let var2 = ((i64::from(adc) << 15) - 16_777_216) + var1;
        let var3 = (LOOKUP_K2_RANGE[range] * var1) >> 9;
        if var2 == 0 {
            return 0;
        }
        ((var3 + (var2 >> 1)) / var2) as u32
    }
}

fn gas_resistance_high(adc: u16, range: usize) -> u32 {
    let var1 = LOOKUP_HIGH_RANGE[range];
    // at least 2560, adc is a 10 bit value
    let var2 = 4096 + (i32::from(adc) - 512) * 3;
    (10_000 * var1 / var2 as u32) * 100
}
