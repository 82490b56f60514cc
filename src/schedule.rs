//! Weekly heating schedules: shape classification and conversion to and from tado timetables.
//!
//! A [`WeeklySchedule`] names up to nine day slots. Exactly three combinations are meaningful,
//! one per tado timetable:
//!
//! | shape              | populated slots       | timetable   |
//! |--------------------|-----------------------|-------------|
//! | `MonToSun`         | `mon_sun`             | `ONE_DAY`   |
//! | `MonToFriSatSun`   | `mon_fri`, `sat`, `sun` | `THREE_DAY` |
//! | `AllDays`          | `mon` … `sun`         | `SEVEN_DAY` |
//!
//! Writing goes `classify` → fill a [`TimetableBuilder`] → allocate the timetable → submit, so every
//! configuration error surfaces before the first API call.
//! Reading fetches the active timetable and its blocks and groups them back into slots.

use crate::client::{TadoApi, TadoClientError};
use crate::models::tado::{
    DayType, HomeId, Power, Temperature, TimetableBlock, TimetableTypeId, ZoneId, ZoneSetting, ZoneType,
};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};

/// Slot order used for classification. Matches the order of [`TimetableTypeId::day_types`].
const ALL_SLOTS: [DayType; 9] = [
    DayType::MondayToSunday,
    DayType::MondayToFriday,
    DayType::Monday,
    DayType::Tuesday,
    DayType::Wednesday,
    DayType::Thursday,
    DayType::Friday,
    DayType::Saturday,
    DayType::Sunday,
];

fn default_geofencing_control() -> bool {
    true
}

/// One scheduled interval of a day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeBlock {
    pub heating: bool,
    /// Celsius. Required when `heating` is on.
    #[serde(default)]
    pub temperature: Option<f64>,
    pub start: String,
    pub end: String,
    /// Whether tado's away settings may override this block.
    #[serde(default = "default_geofencing_control")]
    pub geofencing_control: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WeeklySchedule {
    #[serde(default)]
    pub mon_sun: Option<Vec<TimeBlock>>,
    #[serde(default)]
    pub mon_fri: Option<Vec<TimeBlock>>,
    #[serde(default)]
    pub mon: Option<Vec<TimeBlock>>,
    #[serde(default)]
    pub tue: Option<Vec<TimeBlock>>,
    #[serde(default)]
    pub wed: Option<Vec<TimeBlock>>,
    #[serde(default)]
    pub thu: Option<Vec<TimeBlock>>,
    #[serde(default)]
    pub fri: Option<Vec<TimeBlock>>,
    #[serde(default)]
    pub sat: Option<Vec<TimeBlock>>,
    #[serde(default)]
    pub sun: Option<Vec<TimeBlock>>,
}

impl WeeklySchedule {
    pub fn slot(&self, day: DayType) -> Option<&Vec<TimeBlock>> {
        match day {
            DayType::MondayToSunday => self.mon_sun.as_ref(),
            DayType::MondayToFriday => self.mon_fri.as_ref(),
            DayType::Monday => self.mon.as_ref(),
            DayType::Tuesday => self.tue.as_ref(),
            DayType::Wednesday => self.wed.as_ref(),
            DayType::Thursday => self.thu.as_ref(),
            DayType::Friday => self.fri.as_ref(),
            DayType::Saturday => self.sat.as_ref(),
            DayType::Sunday => self.sun.as_ref(),
        }
    }

    pub fn slot_mut(&mut self, day: DayType) -> &mut Option<Vec<TimeBlock>> {
        match day {
            DayType::MondayToSunday => &mut self.mon_sun,
            DayType::MondayToFriday => &mut self.mon_fri,
            DayType::Monday => &mut self.mon,
            DayType::Tuesday => &mut self.tue,
            DayType::Wednesday => &mut self.wed,
            DayType::Thursday => &mut self.thu,
            DayType::Friday => &mut self.fri,
            DayType::Saturday => &mut self.sat,
            DayType::Sunday => &mut self.sun,
        }
    }

    /// A slot counts as populated when present and non-empty.
    pub fn is_populated(&self, day: DayType) -> bool {
        self.slot(day).is_some_and(|blocks| !blocks.is_empty())
    }

    fn populated_slots(&self) -> Vec<DayType> {
        ALL_SLOTS.iter().copied().filter(|d| self.is_populated(*d)).collect()
    }
}

/// The weekly pattern a schedule expresses.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ScheduleShape {
    MonToSun,
    MonToFriSatSun,
    AllDays,
}

impl ScheduleShape {
    const ALL: [ScheduleShape; 3] = [ScheduleShape::MonToSun, ScheduleShape::MonToFriSatSun, ScheduleShape::AllDays];

    pub fn timetable(self) -> TimetableTypeId {
        match self {
            ScheduleShape::MonToSun => TimetableTypeId::OneDay,
            ScheduleShape::MonToFriSatSun => TimetableTypeId::ThreeDay,
            ScheduleShape::AllDays => TimetableTypeId::SevenDay,
        }
    }

    pub fn from_timetable(timetable: TimetableTypeId) -> Self {
        match timetable {
            TimetableTypeId::OneDay => ScheduleShape::MonToSun,
            TimetableTypeId::ThreeDay => ScheduleShape::MonToFriSatSun,
            TimetableTypeId::SevenDay => ScheduleShape::AllDays,
        }
    }

    /// Day slots this shape requires, all others must be empty.
    pub fn day_types(self) -> &'static [DayType] {
        self.timetable().day_types()
    }
}

#[derive(Debug)]
pub enum ScheduleError {
    /// The populated slots match none of the supported shapes.
    InvalidShape { populated: Vec<DayType> },
    /// A heating block without a target temperature.
    MissingTemperature { day: DayType, index: usize },
    /// A block with heating off that still names a temperature.
    TemperatureWithoutHeating { day: DayType, index: usize },
    /// A remote block whose day type does not belong to the active timetable.
    UnexpectedDayType {
        timetable: TimetableTypeId,
        day: Option<DayType>,
    },
    /// A remote block without start or end.
    MalformedBlock { day: DayType, index: usize },
    /// `append_block` for a day no block was seeded for.
    UnseededDay(DayType),
    /// A collaborator call failed.
    Api { context: String, source: TadoClientError },
}

impl Display for ScheduleError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ScheduleError::InvalidShape { populated } => write!(
                f,
                "no valid schedule provided: set either mon_sun; or mon_fri, sat and sun; or all of mon..sun (populated: {:?})",
                populated
            ),
            ScheduleError::MissingTemperature { day, index } => {
                write!(f, "block {} of {:?} turns heating on but has no temperature", index, day)
            }
            ScheduleError::UnexpectedDayType { timetable, day } => {
                write!(f, "block with day type {:?} does not belong to timetable {:?}", day, timetable)
            }
            ScheduleError::TemperatureWithoutHeating { day, index } => {
                write!(f, "block {} of {:?} turns heating off but sets a temperature", index, day)
            }
            ScheduleError::MalformedBlock { day, index } => {
                write!(f, "block {} of {:?} is missing its start or end", index, day)
            }
            ScheduleError::UnseededDay(day) => write!(f, "no first block submitted for {:?}", day),
            ScheduleError::Api { context, source } => write!(f, "{}: {}", context, source),
        }
    }
}

impl std::error::Error for ScheduleError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ScheduleError::Api { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Decide which shape `schedule` expresses.
pub fn classify(schedule: &WeeklySchedule) -> Result<ScheduleShape, ScheduleError> {
    let populated = schedule.populated_slots();
    ScheduleShape::ALL
        .into_iter()
        .find(|shape| populated == shape.day_types())
        .ok_or(ScheduleError::InvalidShape { populated })
}

/// Receiver of the blocks of one schedule submission.
///
/// `first_block` seeds a day; `append_block` adds to a seeded day.
pub trait BlockSink {
    fn first_block(&mut self, day: DayType, block: TimetableBlock) -> Result<(), ScheduleError>;

    fn append_block(&mut self, day: DayType, block: TimetableBlock) -> Result<(), ScheduleError>;
}

/// A timetable with its flat, day-tagged block list.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteSchedule {
    pub timetable: TimetableTypeId,
    pub blocks: Vec<TimetableBlock>,
}

impl RemoteSchedule {
    pub fn blocks_for(&self, day: DayType) -> Vec<TimetableBlock> {
        self.blocks
            .iter()
            .filter(|b| b.day_type == Some(day))
            .cloned()
            .collect()
    }
}

/// Collects the blocks of one submission for an allocated timetable.
#[derive(Debug)]
pub struct TimetableBuilder {
    timetable: TimetableTypeId,
    blocks: Vec<TimetableBlock>,
    seeded: Vec<DayType>,
}

impl TimetableBuilder {
    pub fn new(timetable: TimetableTypeId) -> Self {
        TimetableBuilder {
            timetable,
            blocks: Vec::new(),
            seeded: Vec::new(),
        }
    }

    fn check_day(&self, day: DayType) -> Result<(), ScheduleError> {
        if self.timetable.day_types().contains(&day) {
            Ok(())
        } else {
            Err(ScheduleError::UnexpectedDayType {
                timetable: self.timetable,
                day: Some(day),
            })
        }
    }

    pub fn finish(self) -> RemoteSchedule {
        RemoteSchedule {
            timetable: self.timetable,
            blocks: self.blocks,
        }
    }
}

impl BlockSink for TimetableBuilder {
    fn first_block(&mut self, day: DayType, mut block: TimetableBlock) -> Result<(), ScheduleError> {
        self.check_day(day)?;
        block.day_type = Some(day);
        self.blocks.retain(|b| b.day_type != Some(day));
        self.blocks.push(block);
        if !self.seeded.contains(&day) {
            self.seeded.push(day);
        }
        Ok(())
    }

    fn append_block(&mut self, day: DayType, mut block: TimetableBlock) -> Result<(), ScheduleError> {
        self.check_day(day)?;
        if !self.seeded.contains(&day) {
            return Err(ScheduleError::UnseededDay(day));
        }
        block.day_type = Some(day);
        self.blocks.push(block);
        Ok(())
    }
}

fn to_remote_block(day: DayType, index: usize, block: &TimeBlock) -> Result<TimetableBlock, ScheduleError> {
    let temperature = if block.heating {
        let celsius = block
            .temperature
            .ok_or(ScheduleError::MissingTemperature { day, index })?;
        Some(Temperature {
            celsius: Some(celsius),
            fahrenheit: None,
        })
    } else if block.temperature.is_some() {
        return Err(ScheduleError::TemperatureWithoutHeating { day, index });
    } else {
        None
    };
    Ok(TimetableBlock {
        day_type: Some(day),
        start: Some(block.start.clone()),
        end: Some(block.end.clone()),
        geolocation_override: Some(!block.geofencing_control),
        setting: Some(ZoneSetting {
            r#type: Some(ZoneType::Heating),
            power: Some(Power::from(block.heating)),
            temperature,
        }),
    })
}

fn from_remote_block(day: DayType, index: usize, block: &TimetableBlock) -> Result<TimeBlock, ScheduleError> {
    let (Some(start), Some(end)) = (block.start.clone(), block.end.clone()) else {
        return Err(ScheduleError::MalformedBlock { day, index });
    };
    let setting = block.setting.as_ref();
    Ok(TimeBlock {
        heating: setting.and_then(|s| s.power) == Some(Power::On),
        temperature: setting.and_then(|s| s.temperature.as_ref()).and_then(celsius_of),
        start,
        end,
        geofencing_control: !block.geolocation_override.unwrap_or(false),
    })
}

/// Celsius value of a remote temperature, converted from fahrenheit when that is all it carries.
fn celsius_of(t: &Temperature) -> Option<f64> {
    t.celsius
        .or_else(|| t.fahrenheit.map(|f| ((f - 32.0) * 5.0 / 9.0 * 10.0).round() / 10.0))
}

/// Feed the blocks of every day of `shape` into `sink`, in input order.
///
/// The first block of each day goes through `first_block`, the rest through `append_block`.
pub fn fill_blocks<S: BlockSink>(schedule: &WeeklySchedule, shape: ScheduleShape, sink: &mut S) -> Result<(), ScheduleError> {
    for &day in shape.day_types() {
        let blocks = schedule.slot(day).map(Vec::as_slice).unwrap_or(&[]);
        for (index, block) in blocks.iter().enumerate() {
            let remote = to_remote_block(day, index, block)?;
            if index == 0 {
                sink.first_block(day, remote)?;
            } else {
                sink.append_block(day, remote)?;
            }
        }
    }
    Ok(())
}

/// Classify and convert without talking to the API.
pub fn to_remote(schedule: &WeeklySchedule) -> Result<RemoteSchedule, ScheduleError> {
    let shape = classify(schedule)?;
    let mut builder = TimetableBuilder::new(shape.timetable());
    fill_blocks(schedule, shape, &mut builder)?;
    Ok(builder.finish())
}

/// Group remote blocks back into the slots of the remote timetable's shape.
///
/// Slots of the shape are always present (possibly empty); all others stay `None`.
pub fn from_remote(remote: &RemoteSchedule) -> Result<WeeklySchedule, ScheduleError> {
    let expected = remote.timetable.day_types();
    let mut grouped: BTreeMap<DayType, Vec<TimeBlock>> = BTreeMap::new();
    for block in &remote.blocks {
        let day = match block.day_type {
            Some(day) if expected.contains(&day) => day,
            other => {
                return Err(ScheduleError::UnexpectedDayType {
                    timetable: remote.timetable,
                    day: other,
                });
            }
        };
        let slot = grouped.entry(day).or_default();
        let converted = from_remote_block(day, slot.len(), block)?;
        slot.push(converted);
    }

    let mut schedule = WeeklySchedule::default();
    for &day in expected {
        *schedule.slot_mut(day) = Some(grouped.remove(&day).unwrap_or_default());
    }
    Ok(schedule)
}

fn api_error(context: String) -> impl FnOnce(TadoClientError) -> ScheduleError {
    move |source| ScheduleError::Api { context, source }
}

/// Replace the schedule of a zone with `schedule`.
///
/// The blocks are built offline first. Only then is the zone's timetable switched to the
/// schedule's shape and every day of that timetable written in full. Failures abort the whole
/// operation; nothing is retried or rolled back.
pub fn write_schedule(
    api: &dyn TadoApi,
    home_id: HomeId,
    zone_id: ZoneId,
    schedule: &WeeklySchedule,
) -> Result<(), ScheduleError> {
    let shape = classify(schedule)?;
    let timetable = shape.timetable();
    let mut builder = TimetableBuilder::new(timetable);
    fill_blocks(schedule, shape, &mut builder)?;
    let remote = builder.finish();

    api.set_active_timetable(home_id, zone_id, timetable)
        .map_err(api_error(format!(
            "unable to initialize schedule for zone {} in home {}",
            zone_id.0, home_id.0
        )))?;
    debug!("Zone {}: activated timetable {:?}", zone_id.0, timetable);

    for &day in timetable.day_types() {
        let blocks = remote.blocks_for(day);
        api.set_timetable_blocks(home_id, zone_id, timetable, day, &blocks)
            .map_err(api_error(format!(
                "unable to set {:?} blocks for zone {} in home {}",
                day, zone_id.0, home_id.0
            )))?;
    }
    info!(
        "Zone {}: wrote {:?} schedule ({} block(s))",
        zone_id.0,
        shape,
        remote.blocks.len()
    );
    Ok(())
}

/// Fetch the active timetable of a zone and its blocks.
pub fn fetch_schedule(api: &dyn TadoApi, home_id: HomeId, zone_id: ZoneId) -> Result<RemoteSchedule, ScheduleError> {
    let active = api
        .get_active_timetable(home_id, zone_id)
        .map_err(api_error(format!(
            "unable to get active timetable for zone {} in home {}",
            zone_id.0, home_id.0
        )))?;
    let timetable = active.id.ok_or_else(|| ScheduleError::Api {
        context: format!("active timetable for zone {} in home {}", zone_id.0, home_id.0),
        source: TadoClientError::Transport("response carries no timetable id".to_string()),
    })?;
    let blocks = api
        .get_timetable_blocks(home_id, zone_id, timetable)
        .map_err(api_error(format!(
            "unable to get heating schedule for zone {} in home {}",
            zone_id.0, home_id.0
        )))?;
    Ok(RemoteSchedule { timetable, blocks })
}

pub fn read_schedule(api: &dyn TadoApi, home_id: HomeId, zone_id: ZoneId) -> Result<WeeklySchedule, ScheduleError> {
    let remote = fetch_schedule(api, home_id, zone_id)?;
    debug!(
        "Zone {}: active {:?} schedule with {} block(s)",
        zone_id.0,
        ScheduleShape::from_timetable(remote.timetable),
        remote.blocks.len()
    );
    from_remote(&remote)
}
