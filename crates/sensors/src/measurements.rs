use core::fmt;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Unit {
    HectoPascal,
    C,
    RH,
    Ohm,
    Ppm,
    MicrogramPerM3,
    /// particles per 0.1 liter of air
    NumberPerDeciliter,
    /// dimensionless index
    Index,
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Unit::HectoPascal => f.write_str("hPa"),
            Unit::C => f.write_str("°C"),
            Unit::RH => f.write_str("%RH"),
            Unit::Ohm => f.write_str("Ω"),
            Unit::Ppm => f.write_str("ppm"),
            Unit::MicrogramPerM3 => f.write_str("µg/m³"),
            Unit::NumberPerDeciliter => f.write_str("#/0.1L"),
            Unit::Index => f.write_str(""),
        }
    }
}

/// What a [`Measurement`] measures. The ids are stable, downstream
/// consumers key on them.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    strum::EnumIter,
    strum::IntoStaticStr,
)]
pub enum Kind {
    Pressure,
    Temperature,
    Humidity,
    Voc,
    Nox,
    Co2,
    AirQualityIndex,
    GasResistance,
    PmEnvironmental,
    PmStandard,
    ParticleCount,
}

impl Kind {
    #[must_use]
    pub fn id(&self) -> &'static str {
        match self {
            Kind::Pressure => "room_pressure",
            Kind::Temperature => "room_temperature",
            Kind::Humidity => "room_humidity",
            Kind::Voc => "room_voc",
            Kind::Nox => "room_nox",
            Kind::Co2 => "room_co2",
            Kind::AirQualityIndex => "room_iaq",
            Kind::GasResistance => "room_gasResistance",
            Kind::PmEnvironmental => "room_air_quality_pm_concentration_env",
            Kind::PmStandard => "room_air_quality_pm_concentration_standard",
            Kind::ParticleCount => "room_air_quality_particles_count",
        }
    }

    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Kind::Pressure => "barometric pressure",
            Kind::Temperature => "air temperature",
            Kind::Humidity => "relative humidity",
            Kind::Voc => "volatile organic compounds index",
            Kind::Nox => "nitrogen oxides index",
            Kind::Co2 => "carbon dioxide concentration",
            Kind::AirQualityIndex => "indoor air quality score (0-100)",
            Kind::GasResistance => "resistance of the heated gas sensing layer",
            Kind::PmEnvironmental => "particulate matter concentration under atmospheric conditions",
            Kind::PmStandard => "particulate matter concentration, standard particle",
            Kind::ParticleCount => "particles larger than a given diameter",
        }
    }

    #[must_use]
    pub fn unit(&self) -> Unit {
        match self {
            Kind::Pressure => Unit::HectoPascal,
            Kind::Temperature => Unit::C,
            Kind::Humidity => Unit::RH,
            Kind::Voc | Kind::Nox | Kind::AirQualityIndex => Unit::Index,
            Kind::Co2 => Unit::Ppm,
            Kind::GasResistance => Unit::Ohm,
            Kind::PmEnvironmental | Kind::PmStandard => Unit::MicrogramPerM3,
            Kind::ParticleCount => Unit::NumberPerDeciliter,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TagKey {
    ParticleConcentration,
    ParticleSize,
}

impl TagKey {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            TagKey::ParticleConcentration => "particleConcentration",
            TagKey::ParticleSize => "particleSize",
        }
    }
}

/// Distinguishes records of the same [`Kind`] from one sample, for example
/// the PM1.0 and PM2.5 concentrations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Tag {
    pub key: TagKey,
    pub value: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Measurement {
    pub kind: Kind,
    pub value: f64,
    /// the sensor that produced this, its name or a device specific id
    pub source: String,
    pub tag: Option<Tag>,
}

impl Measurement {
    pub fn new(kind: Kind, value: impl Into<f64>, source: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
            source: source.into(),
            tag: None,
        }
    }

    #[must_use]
    pub fn tagged(mut self, key: TagKey, value: &'static str) -> Self {
        self.tag = Some(Tag { key, value });
        self
    }

    #[must_use]
    pub fn unit(&self) -> Unit {
        self.kind.unit()
    }
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind.id())?;
        if let Some(Tag { key, value }) = self.tag {
            write!(f, "[{}={value}]", key.as_str())?;
        }
        write!(f, " {:.2}{} ({})", self.value, self.unit(), self.source)
    }
}
