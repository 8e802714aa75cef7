//! Register map of the BME680/BME688

pub const CHIP_ID: u8 = 0xd0;
pub const VARIANT_ID: u8 = 0xf0;
pub const SOFT_RESET: u8 = 0xe0;

/// first status byte of the measurement field
pub const FIELD0: u8 = 0x1d;
pub const FIELD_LEN: usize = 17;

pub const RES_HEAT0: u8 = 0x5a;
pub const GAS_WAIT0: u8 = 0x64;
pub const CTRL_GAS_1: u8 = 0x71;
pub const CTRL_HUM: u8 = 0x72;
pub const CTRL_MEAS: u8 = 0x74;
pub const CONFIG: u8 = 0x75;

/// The coefficients live in three separate ranges, concatenated in this
/// order they form one 42 byte block.
pub const COEFF1: u8 = 0x8a;
pub const COEFF1_LEN: usize = 23;
pub const COEFF2: u8 = 0xe1;
pub const COEFF2_LEN: usize = 14;
pub const COEFF3: u8 = 0x00;
pub const COEFF3_LEN: usize = 5;
pub const COEFF_LEN: usize = COEFF1_LEN + COEFF2_LEN + COEFF3_LEN;

pub const CHIP_ID_BME68X: u8 = 0x61;
pub const SOFT_RESET_CMD: u8 = 0xb6;

pub const NEW_DATA_MSK: u8 = 0x80;
pub const GAS_RANGE_MSK: u8 = 0x0f;
pub const GAS_VALID_MSK: u8 = 0x20;
pub const HEAT_STAB_MSK: u8 = 0x10;

pub const MODE_MSK: u8 = 0x03;
pub const MODE_SLEEP: u8 = 0x00;
pub const MODE_FORCED: u8 = 0x01;

pub const OSRS_T_POS: u8 = 5;
pub const OSRS_P_POS: u8 = 2;
pub const FILTER_POS: u8 = 2;
pub const RUN_GAS_POS: u8 = 4;
pub const RUN_GAS_LOW: u8 = 0x01;
pub const RUN_GAS_HIGH: u8 = 0x02;
/// index of the heater profile used, only profile 0 is configured
pub const NB_CONV: u8 = 0;

pub const FILTER_SIZE_3: u8 = 2;
