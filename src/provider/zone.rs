use super::{Attribute, AttributeType, DataSource, Diagnostics, Schema, lookup_home, lookup_zone};
use crate::client::TadoApi;
use crate::utils::serde_enum_name;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ZoneModel {
    #[serde(default)]
    pub id: Option<i64>,
    pub home: String,
    pub name: String,
    #[serde(default)]
    pub r#type: Option<String>,
    #[serde(default)]
    pub early_start: Option<bool>,
    #[serde(default)]
    pub dazzle_mode_enabled: Option<bool>,
    #[serde(default)]
    pub open_window_detection_enabled: Option<bool>,
}

/// `tado_zone`: a zone of a home, looked up by home and zone name.
pub struct ZoneDataSource;

impl DataSource for ZoneDataSource {
    type Model = ZoneModel;

    fn type_name(&self) -> &'static str {
        "tado_zone"
    }

    fn schema(&self) -> Schema {
        use AttributeType::*;
        Schema {
            description: "A zone of a tado° home.",
            attributes: vec![
                Attribute::computed("id", Int64, "Zone ID."),
                Attribute::required("home", String, "Name of the home the zone belongs to."),
                Attribute::required("name", String, "Zone name."),
                Attribute::computed("type", String, "Zone type (HEATING, HOT_WATER or AIR_CONDITIONING)."),
                Attribute::computed("early_start", Bool, "Whether early start is enabled."),
                Attribute::computed("dazzle_mode_enabled", Bool, "Whether dazzle mode is enabled."),
                Attribute::computed(
                    "open_window_detection_enabled",
                    Bool,
                    "Whether open window detection is enabled.",
                ),
            ],
        }
    }

    fn read(&self, diags: &mut Diagnostics, api: &dyn TadoApi, config: ZoneModel) -> Option<ZoneModel> {
        let (home_id, _) = lookup_home(diags, api, &config.home)?;
        let (zone_id, zone) = lookup_zone(diags, api, home_id, &config.name)?;
        let early_start = match api.get_early_start(home_id, zone_id) {
            Ok(es) => es.enabled,
            Err(e) => {
                diags.add_error(
                    "Tado API Error",
                    format!("Unable to get early start of zone '{}': {}", config.name, e),
                );
                return None;
            }
        };
        let dazzle_mode_enabled = zone
            .dazzle_mode
            .as_ref()
            .and_then(|d| d.enabled)
            .or(zone.dazzle_enabled);
        Some(ZoneModel {
            id: Some(zone_id.0),
            r#type: zone.r#type.as_ref().and_then(serde_enum_name),
            early_start,
            dazzle_mode_enabled,
            open_window_detection_enabled: zone.open_window_detection.as_ref().and_then(|o| o.enabled),
            ..config
        })
    }
}
