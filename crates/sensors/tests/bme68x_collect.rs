mod common;

use common::{assert_close, RecordingDelay};
use embedded_hal::i2c::ErrorKind;
use embedded_hal_mock::eh1::i2c::{Mock, Transaction};
use sensors::bosch::calibration::Variant;
use sensors::{Bme68x, Error, Kind, ProtocolError, Sensor};

const ADDR: u8 = 0x76;

const COEFF1: [u8; 23] = [
    0x55, 0x67, 0x03, 0x00, 0x7d, 0x8e, 0x43, 0xd6, 0x58, 0x00, 0x03, 0x19, 0xb5, 0xff, 0x2a,
    0x1e, 0x00, 0x00, 0xf0, 0xf7, 0xda, 0xf3, 0x1e,
];
const COEFF2: [u8; 14] = [
    0x3f, 0x7b, 0x2f, 0x00, 0x2d, 0x14, 0x78, 0x9c, 0xfa, 0x65, 0xe2, 0xce, 0xde, 0x12,
];
const COEFF3: [u8; 5] = [0x2a, 0x00, 0x11, 0x00, 0xf3];

/// adc pressure 400000, temperature 500000, humidity 20000, gas 600 in
/// range 5. The last argument is the gas status byte.
fn field(gas_status: u8) -> Vec<u8> {
    vec![
        0x80, 0x00, 0x61, 0xa8, 0x00, 0x7a, 0x12, 0x00, 0x4e, 0x20, 0x00, 0x00, 0x00, 0x96,
        gas_status, 0x00, 0x00,
    ]
}

fn bring_up() -> Vec<Transaction> {
    vec![
        Transaction::write(ADDR, vec![0xe0, 0xb6]),
        Transaction::write_read(ADDR, vec![0xd0], vec![0x61]),
        Transaction::write_read(ADDR, vec![0xf0], vec![0x00]),
        Transaction::write_read(ADDR, vec![0x8a], COEFF1.to_vec()),
        Transaction::write_read(ADDR, vec![0xe1], COEFF2.to_vec()),
        Transaction::write_read(ADDR, vec![0x00], COEFF3.to_vec()),
    ]
}

/// heater code 114 is 320 °C at 25 °C ambient, 0x65 is 150 ms. The chip
/// reports `ctrl_meas` when asked whether it is asleep.
fn configure_and_trigger(ctrl_meas: u8) -> [Transaction; 3] {
    [
        Transaction::write_read(ADDR, vec![0x74], vec![ctrl_meas]),
        Transaction::write(
            ADDR,
            vec![
                0x5a, 114, 0x64, 0x65, 0x71, 0x10, 0x72, 0x02, 0x75, 0x08, 0x74, 0x8c,
            ],
        ),
        Transaction::write(ADDR, vec![0x74, 0x8d]),
    ]
}

#[test]
fn collect_compensates_and_scores() {
    logger::tracing::setup_for_tests();

    let mut expectations = bring_up();
    expectations.extend(configure_and_trigger(0x00));
    expectations.extend([
        Transaction::write_read(ADDR, vec![0x1d], vec![0x80]),
        // gas valid, heat stable, range 5
        Transaction::write_read(ADDR, vec![0x1d], field(0x35)),
    ]);
    expectations.extend(configure_and_trigger(0x8c));
    expectations.extend([
        // not yet, then ready
        Transaction::write_read(ADDR, vec![0x1d], vec![0x00]),
        Transaction::write_read(ADDR, vec![0x1d], vec![0x80]),
        // heater not stable
        Transaction::write_read(ADDR, vec![0x1d], field(0x25)),
    ]);
    let mut mock = Mock::new(&expectations);
    let delay = RecordingDelay::default();

    let mut bme = Bme68x::new(delay.clone());
    bme.initialize(mock.clone(), ADDR).unwrap();
    assert_eq!(bme.variant(), Some(Variant::GasLow));
    assert_eq!(bme.coefficients().unwrap().t1, 26106);
    assert_eq!(delay.total_ms(), 10);
    delay.reset();

    let records = bme.collect();
    // 14 oversampling cycles plus overhead, then 150 ms heating
    assert_eq!(delay.total_us(), 32_775 + 150_000);
    let kinds: Vec<_> = records.iter().map(|m| m.kind).collect();
    assert_eq!(
        kinds,
        [
            Kind::Temperature,
            Kind::Pressure,
            Kind::Humidity,
            Kind::GasResistance,
            Kind::AirQualityIndex
        ]
    );
    assert_close(records[0].value, 25.96);
    assert_close(records[1].value, 935.93);
    assert_close(records[2].value, 39.208);
    assert_eq!(records[3].value, 232_764.0);
    // one sample: the baseline is a fiftieth of the reading, gas scores
    // the full 75
    assert_eq!(records[4].value, 99.0);
    assert!(records.iter().all(|m| m.source == "bme68x"));

    delay.reset();
    let records = bme.collect();
    assert_eq!(delay.total_us(), 32_775 + 150_000 + 10_000);
    assert_eq!(records.len(), 4);
    assert!(records.iter().all(|m| m.kind != Kind::AirQualityIndex));
    assert_eq!(bme.baseline().len(), 2);

    mock.done();
}

#[test]
fn gives_up_after_ten_polls() {
    let mut expectations = bring_up();
    expectations.extend(configure_and_trigger(0x00));
    for _ in 0..10 {
        expectations.push(Transaction::write_read(ADDR, vec![0x1d], vec![0x00]));
    }
    let mut mock = Mock::new(&expectations);
    let delay = RecordingDelay::default();

    let mut bme = Bme68x::new(delay.clone());
    bme.initialize(mock.clone(), ADDR).unwrap();
    delay.reset();

    assert_eq!(bme.measure(), Err(ProtocolError::NoNewData(10).into()));
    assert_eq!(delay.total_us(), 32_775 + 150_000 + 9 * 10_000);
    mock.done();
}

#[test]
fn failed_sample_keeps_previous_records() {
    let mut expectations = bring_up();
    expectations.extend(configure_and_trigger(0x00));
    expectations.extend([
        Transaction::write_read(ADDR, vec![0x1d], vec![0x80]),
        Transaction::write_read(ADDR, vec![0x1d], field(0x35)),
    ]);
    expectations.push(Transaction::write_read(ADDR, vec![0x74], vec![0x8c]));
    expectations.push(
        Transaction::write(
            ADDR,
            vec![
                0x5a, 114, 0x64, 0x65, 0x71, 0x10, 0x72, 0x02, 0x75, 0x08, 0x74, 0x8c,
            ],
        )
        .with_error(ErrorKind::Other),
    );
    let mut mock = Mock::new(&expectations);

    let mut bme = Bme68x::new(RecordingDelay::default());
    bme.initialize(mock.clone(), ADDR).unwrap();
    let first = bme.collect();
    assert_eq!(bme.collect(), first);
    assert_eq!(bme.error_counts().bus, 1);
    mock.done();
}

#[test]
fn coefficient_read_failure_is_a_calibration_error() {
    let expectations = [
        Transaction::write(ADDR, vec![0xe0, 0xb6]),
        Transaction::write_read(ADDR, vec![0xd0], vec![0x61]),
        Transaction::write_read(ADDR, vec![0xf0], vec![0x01]),
        Transaction::write_read(ADDR, vec![0x8a], vec![0; 23]).with_error(ErrorKind::Other),
    ];
    let mut mock = Mock::new(&expectations);

    let mut bme = Bme68x::new(RecordingDelay::default());
    assert_eq!(
        bme.initialize(mock.clone(), ADDR),
        Err(Error::Calibration(ErrorKind::Other))
    );
    assert_eq!(bme.initialize(mock.clone(), ADDR), Err(Error::AlreadyInitialized));
    assert!(bme.collect().is_empty());
    mock.done();
}

#[test]
fn wrong_chip_is_rejected() {
    let expectations = [
        Transaction::write(ADDR, vec![0xe0, 0xb6]),
        Transaction::write_read(ADDR, vec![0xd0], vec![0x60]),
    ];
    let mut mock = Mock::new(&expectations);

    let mut bme = Bme68x::new(RecordingDelay::default());
    assert_eq!(
        bme.initialize(mock.clone(), ADDR),
        Err(ProtocolError::ChipId {
            got: 0x60,
            expected: 0x61
        }
        .into())
    );
    mock.done();
}

#[test]
fn leftover_forced_mode_is_ended_before_configuring() {
    let mut expectations = bring_up();
    expectations.extend([
        // still in forced mode from a cycle that gave up
        Transaction::write_read(ADDR, vec![0x74], vec![0x8d]),
        Transaction::write(ADDR, vec![0x74, 0x8c]),
        Transaction::write_read(ADDR, vec![0x74], vec![0x8d]),
    ]);
    expectations.extend(configure_and_trigger(0x8c));
    expectations.extend([
        Transaction::write_read(ADDR, vec![0x1d], vec![0x80]),
        Transaction::write_read(ADDR, vec![0x1d], field(0x35)),
    ]);
    let mut mock = Mock::new(&expectations);
    let delay = RecordingDelay::default();

    let mut bme = Bme68x::new(delay.clone());
    bme.initialize(mock.clone(), ADDR).unwrap();
    delay.reset();

    let reading = bme.measure().unwrap();
    assert_close(f64::from(reading.temperature), 25.96);
    assert_eq!(delay.total_us(), 2 * 10_000 + 32_775 + 150_000);
    mock.done();
}

#[test]
fn stuck_out_of_sleep_mode_is_a_protocol_error() {
    let mut expectations = bring_up();
    expectations.push(Transaction::write_read(ADDR, vec![0x74], vec![0x8d]));
    expectations.push(Transaction::write(ADDR, vec![0x74, 0x8c]));
    for _ in 1..10 {
        expectations.push(Transaction::write_read(ADDR, vec![0x74], vec![0x8d]));
    }
    let mut mock = Mock::new(&expectations);
    let delay = RecordingDelay::default();

    let mut bme = Bme68x::new(delay.clone());
    bme.initialize(mock.clone(), ADDR).unwrap();
    delay.reset();

    assert_eq!(bme.measure(), Err(ProtocolError::NotAsleep(10).into()));
    assert_eq!(delay.total_ms(), 100);
    mock.done();
}
