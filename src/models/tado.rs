//! Models for the subset of the tado° API the provider talks to.
//!
//! Notes
//! - Response objects keep every field optional; the API omits fields freely.
//! - Request bodies skip `None` fields so partially filled structs serialize cleanly.
//! - Time-of-day fields remain strings (`HH:MM`, with `24:00` allowed as an end).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =====================
// Scalar ID newtype wrappers
// =====================

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HomeId(pub i64);

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ZoneId(pub i64);

/// Day grouping of a zone timetable.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum TimetableTypeId {
    // 0=ONE_DAY, 1=THREE_DAY, 2=SEVEN_DAY
    OneDay,
    ThreeDay,
    SevenDay,
}

impl TimetableTypeId {
    pub fn as_i32(self) -> i32 {
        match self {
            TimetableTypeId::OneDay => 0,
            TimetableTypeId::ThreeDay => 1,
            TimetableTypeId::SevenDay => 2,
        }
    }

    /// Day types that carry blocks under this grouping, in week order.
    pub fn day_types(self) -> &'static [DayType] {
        match self {
            TimetableTypeId::OneDay => &[DayType::MondayToSunday],
            TimetableTypeId::ThreeDay => &[DayType::MondayToFriday, DayType::Saturday, DayType::Sunday],
            TimetableTypeId::SevenDay => &[
                DayType::Monday,
                DayType::Tuesday,
                DayType::Wednesday,
                DayType::Thursday,
                DayType::Friday,
                DayType::Saturday,
                DayType::Sunday,
            ],
        }
    }
}

impl serde::Serialize for TimetableTypeId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_i32(self.as_i32())
    }
}

impl<'de> serde::Deserialize<'de> for TimetableTypeId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct V;
        impl<'de> serde::de::Visitor<'de> for V {
            type Value = TimetableTypeId;

            fn expecting(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
                write!(f, "an integer 0, 1 or 2 for TimetableTypeId")
            }

            fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                match value {
                    0 => Ok(TimetableTypeId::OneDay),
                    1 => Ok(TimetableTypeId::ThreeDay),
                    2 => Ok(TimetableTypeId::SevenDay),
                    other => Err(E::invalid_value(serde::de::Unexpected::Signed(other), &self)),
                }
            }

            fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                match i64::try_from(value) {
                    Ok(v) => self.visit_i64(v),
                    Err(_) => Err(E::invalid_value(serde::de::Unexpected::Unsigned(value), &self)),
                }
            }
        }

        deserializer.deserialize_any(V)
    }
}

// =====================
// Core enums (string enums on the wire)
// =====================

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DayType {
    MondayToSunday,
    MondayToFriday,
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HomePresence {
    Home,
    Away,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Power {
    #[serde(rename = "ON")]
    On,
    #[serde(rename = "OFF")]
    Off,
}

impl From<bool> for Power {
    fn from(on: bool) -> Self {
        if on { Power::On } else { Power::Off }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TemperatureUnit {
    Celsius,
    Fahrenheit,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimetableTypeType {
    OneDay,
    ThreeDay,
    SevenDay,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ZoneType {
    AirConditioning,
    Heating,
    HotWater,
}

// =====================
// Settings
// =====================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Temperature {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub celsius: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fahrenheit: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ZoneSetting {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub r#type: Option<ZoneType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub power: Option<Power>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<Temperature>,
}

// =====================
// User and home
// =====================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct HomeBase {
    pub id: Option<HomeId>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub name: Option<String>,
    pub email: Option<String>,
    pub username: Option<String>,
    pub id: Option<String>,
    pub locale: Option<String>,
    pub homes: Option<Vec<HomeBase>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct HomeContactDetails {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct HomeAddress {
    pub address_line1: Option<String>,
    pub address_line2: Option<String>,
    pub zip_code: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct HomeGeolocation {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Home {
    #[serde(flatten)]
    pub base: HomeBase,
    pub date_time_zone: Option<String>,
    pub date_created: Option<DateTime<Utc>>,
    pub temperature_unit: Option<TemperatureUnit>,
    pub contact_details: Option<HomeContactDetails>,
    pub address: Option<HomeAddress>,
    pub geolocation: Option<HomeGeolocation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct HomeState {
    pub presence: Option<HomePresence>,
    pub presence_locked: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PresenceLock {
    pub home_presence: Option<HomePresence>,
}

// =====================
// Zones
// =====================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Zone {
    pub id: Option<ZoneId>,
    pub name: Option<String>,
    pub r#type: Option<ZoneType>,
    pub date_created: Option<DateTime<Utc>>,
    pub dazzle_enabled: Option<bool>,
    pub dazzle_mode: Option<ZoneDazzleMode>,
    pub open_window_detection: Option<ZoneOpenWindowDetection>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ZoneDazzleMode {
    pub supported: Option<bool>,
    pub enabled: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ZoneOpenWindowDetection {
    pub supported: Option<bool>,
    pub enabled: Option<bool>,
    pub timeout_in_seconds: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct EarlyStart {
    pub enabled: Option<bool>,
}

// =====================
// Timetables
// =====================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct TimetableBlock {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub day_type: Option<DayType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<String>, // HH:MM
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<String>, // HH:MM
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geolocation_override: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub setting: Option<ZoneSetting>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct TimetableType {
    pub id: Option<TimetableTypeId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub r#type: Option<TimetableTypeType>,
}
