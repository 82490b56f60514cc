use super::{Attribute, AttributeType, Diagnostics, Resource, Schema, lookup_home, lookup_zone};
use crate::client::TadoApi;
use crate::schedule::{self, ScheduleError, WeeklySchedule};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HeatingScheduleModel {
    #[serde(default)]
    pub id: Option<String>,
    pub home_name: String,
    pub zone_name: String,
    #[serde(flatten)]
    pub schedule: WeeklySchedule,
}

/// `tado_heating_schedule`: the weekly heating schedule of a zone.
pub struct HeatingScheduleResource;

const SLOTS: [(&str, &str); 9] = [
    ("mon_sun", "Blocks applied to every day of the week."),
    ("mon_fri", "Blocks applied Monday to Friday."),
    ("mon", "Monday blocks."),
    ("tue", "Tuesday blocks."),
    ("wed", "Wednesday blocks."),
    ("thu", "Thursday blocks."),
    ("fri", "Friday blocks."),
    ("sat", "Saturday blocks."),
    ("sun", "Sunday blocks."),
];

fn block_attributes() -> Vec<Attribute> {
    use AttributeType::*;
    vec![
        Attribute::required("heating", Bool, "Whether heating is on during the block."),
        Attribute::optional("temperature", Float64, "Target temperature in °C. Required when heating is on, not allowed when it is off."),
        Attribute::required("start", String, "Start time (hh:mm)."),
        Attribute::required("end", String, "End time (hh:mm)."),
        Attribute::optional_computed(
            "geofencing_control",
            Bool,
            "Whether tado's away settings apply during the block. Defaults to true.",
        ),
    ]
}

fn schedule_error(diags: &mut Diagnostics, err: ScheduleError) {
    match err {
        ScheduleError::InvalidShape { .. }
        | ScheduleError::MissingTemperature { .. }
        | ScheduleError::TemperatureWithoutHeating { .. } => {
            diags.add_error("Invalid Heating Schedule", err.to_string())
        }
        _ => diags.add_error("Tado API Error", err.to_string()),
    }
}

fn resource_id(home_name: &str, zone_name: &str) -> String {
    format!("{}/{}", home_name, zone_name)
}

impl HeatingScheduleResource {
    fn apply(
        &self,
        diags: &mut Diagnostics,
        api: &dyn TadoApi,
        planned: HeatingScheduleModel,
    ) -> Option<HeatingScheduleModel> {
        let (home_id, _) = lookup_home(diags, api, &planned.home_name)?;
        let (zone_id, _) = lookup_zone(diags, api, home_id, &planned.zone_name)?;
        if let Err(e) = schedule::write_schedule(api, home_id, zone_id, &planned.schedule) {
            schedule_error(diags, e);
            return None;
        }
        self.fetch(diags, api, planned)
    }

    fn fetch(
        &self,
        diags: &mut Diagnostics,
        api: &dyn TadoApi,
        state: HeatingScheduleModel,
    ) -> Option<HeatingScheduleModel> {
        let (home_id, _) = lookup_home(diags, api, &state.home_name)?;
        let (zone_id, _) = lookup_zone(diags, api, home_id, &state.zone_name)?;
        match schedule::read_schedule(api, home_id, zone_id) {
            Ok(schedule) => Some(HeatingScheduleModel {
                id: Some(resource_id(&state.home_name, &state.zone_name)),
                schedule,
                ..state
            }),
            Err(e) => {
                schedule_error(diags, e);
                None
            }
        }
    }
}

impl Resource for HeatingScheduleResource {
    type Model = HeatingScheduleModel;

    fn type_name(&self) -> &'static str {
        "tado_heating_schedule"
    }

    fn schema(&self) -> Schema {
        let mut attributes = vec![
            Attribute::computed("id", AttributeType::String, "Resource ID (home_name/zone_name)."),
            Attribute::required("home_name", AttributeType::String, "Name of the home."),
            Attribute::required("zone_name", AttributeType::String, "Name of the zone."),
        ];
        attributes.extend(
            SLOTS
                .iter()
                .map(|&(name, doc)| Attribute::optional(name, AttributeType::ListNested(block_attributes()), doc)),
        );
        Schema {
            description: "Heating schedule of a tado° zone. Set either mon_sun; or mon_fri, sat and sun; or all of mon to sun.",
            attributes,
        }
    }

    fn validate(&self, diags: &mut Diagnostics, config: &HeatingScheduleModel) -> Option<()> {
        match schedule::to_remote(&config.schedule) {
            Ok(_) => Some(()),
            Err(e) => {
                schedule_error(diags, e);
                None
            }
        }
    }

    fn create(
        &self,
        diags: &mut Diagnostics,
        api: &dyn TadoApi,
        config: HeatingScheduleModel,
    ) -> Option<HeatingScheduleModel> {
        self.apply(diags, api, config)
    }

    fn read(
        &self,
        diags: &mut Diagnostics,
        api: &dyn TadoApi,
        state: HeatingScheduleModel,
    ) -> Option<HeatingScheduleModel> {
        self.fetch(diags, api, state)
    }

    fn update(
        &self,
        diags: &mut Diagnostics,
        api: &dyn TadoApi,
        _prior: HeatingScheduleModel,
        planned: HeatingScheduleModel,
    ) -> Option<HeatingScheduleModel> {
        self.apply(diags, api, planned)
    }

    // Schedules cannot be removed from a zone; the resource is only forgotten.
    fn delete(&self, _diags: &mut Diagnostics, _api: &dyn TadoApi, _state: HeatingScheduleModel) -> Option<()> {
        Some(())
    }

    fn import(&self, diags: &mut Diagnostics, id: &str) -> Option<HeatingScheduleModel> {
        let parts: Vec<&str> = id.split('/').collect();
        match parts.as_slice() {
            [home, zone] if !home.is_empty() && !zone.is_empty() => Some(HeatingScheduleModel {
                id: Some(id.to_string()),
                home_name: home.to_string(),
                zone_name: zone.to_string(),
                schedule: WeeklySchedule::default(),
            }),
            _ => {
                diags.add_error(
                    "Invalid Import ID",
                    format!("Expected an ID of the form 'home_name/zone_name', got '{}'.", id),
                );
                None
            }
        }
    }
}
