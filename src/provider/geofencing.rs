use super::{Attribute, AttributeType, Diagnostics, Resource, Schema, lookup_home};
use crate::client::TadoApi;
use crate::models::tado::{HomeId, HomePresence};
use log::info;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeofencingModel {
    #[serde(default)]
    pub id: Option<String>,
    pub home_name: String,
    pub presence: String,
}

/// Desired presence of a home: follow geofencing, or lock to home/away.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PresenceSetting {
    Auto,
    Locked(HomePresence),
}

impl FromStr for PresenceSetting {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(PresenceSetting::Auto),
            "home" => Ok(PresenceSetting::Locked(HomePresence::Home)),
            "away" => Ok(PresenceSetting::Locked(HomePresence::Away)),
            other => Err(format!(
                "Invalid presence value '{}', must be one of 'auto', 'home' or 'away'.",
                other
            )),
        }
    }
}

/// `tado_geofencing`: presence lock of a home.
pub struct GeofencingResource;

impl GeofencingResource {
    fn apply(&self, diags: &mut Diagnostics, api: &dyn TadoApi, planned: GeofencingModel) -> Option<GeofencingModel> {
        let setting = parse_presence(diags, &planned.presence)?;
        let (home_id, _) = lookup_home(diags, api, &planned.home_name)?;
        let result = match setting {
            PresenceSetting::Auto => api.delete_presence_lock(home_id),
            PresenceSetting::Locked(presence) => api.set_presence_lock(home_id, presence),
        };
        if let Err(e) = result {
            diags.add_error(
                "Tado API Error",
                format!("Unable to set presence of home '{}': {}", planned.home_name, e),
            );
            return None;
        }
        info!("Home {}: presence set to {}", home_id.0, planned.presence);
        read_presence(diags, api, home_id, planned.home_name)
    }
}

fn parse_presence(diags: &mut Diagnostics, value: &str) -> Option<PresenceSetting> {
    match value.parse() {
        Ok(setting) => Some(setting),
        Err(msg) => {
            diags.add_error("Invalid Presence", msg);
            None
        }
    }
}

fn read_presence(
    diags: &mut Diagnostics,
    api: &dyn TadoApi,
    home_id: HomeId,
    home_name: String,
) -> Option<GeofencingModel> {
    let state = match api.get_home_state(home_id) {
        Ok(state) => state,
        Err(e) => {
            diags.add_error(
                "Tado API Error",
                format!("Unable to get state of home '{}': {}", home_name, e),
            );
            return None;
        }
    };
    let presence = match (state.presence_locked.unwrap_or(false), state.presence) {
        (false, _) => "auto",
        (true, Some(HomePresence::Home)) => "home",
        (true, Some(HomePresence::Away)) => "away",
        (true, None) => {
            diags.add_error(
                "Tado API Error",
                format!("Home '{}' reports a presence lock without a presence", home_name),
            );
            return None;
        }
    };
    Some(GeofencingModel {
        id: Some(home_name.clone()),
        home_name,
        presence: presence.to_string(),
    })
}

impl Resource for GeofencingResource {
    type Model = GeofencingModel;

    fn type_name(&self) -> &'static str {
        "tado_geofencing"
    }

    fn schema(&self) -> Schema {
        use AttributeType::*;
        Schema {
            description: "Geofencing of a tado° home: follow the residents' locations or lock presence.",
            attributes: vec![
                Attribute::computed("id", String, "Resource ID (the home name)."),
                Attribute::required("home_name", String, "Name of the home."),
                Attribute::required("presence", String, "One of 'auto', 'home' or 'away'."),
            ],
        }
    }

    fn validate(&self, diags: &mut Diagnostics, config: &GeofencingModel) -> Option<()> {
        parse_presence(diags, &config.presence).map(|_| ())
    }

    fn create(&self, diags: &mut Diagnostics, api: &dyn TadoApi, config: GeofencingModel) -> Option<GeofencingModel> {
        self.apply(diags, api, config)
    }

    fn read(&self, diags: &mut Diagnostics, api: &dyn TadoApi, state: GeofencingModel) -> Option<GeofencingModel> {
        let (home_id, _) = lookup_home(diags, api, &state.home_name)?;
        read_presence(diags, api, home_id, state.home_name)
    }

    fn update(
        &self,
        diags: &mut Diagnostics,
        api: &dyn TadoApi,
        _prior: GeofencingModel,
        planned: GeofencingModel,
    ) -> Option<GeofencingModel> {
        self.apply(diags, api, planned)
    }

    fn delete(&self, _diags: &mut Diagnostics, _api: &dyn TadoApi, _state: GeofencingModel) -> Option<()> {
        Some(())
    }

    fn import(&self, _diags: &mut Diagnostics, id: &str) -> Option<GeofencingModel> {
        Some(GeofencingModel {
            id: Some(id.to_string()),
            home_name: id.to_string(),
            presence: "auto".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::tado::HomeState;
    use crate::testing::FakeTado;

    fn model(presence: &str) -> GeofencingModel {
        GeofencingModel {
            id: None,
            home_name: "Home".to_string(),
            presence: presence.to_string(),
        }
    }

    #[test]
    fn parses_presence_values() {
        assert_eq!("auto".parse(), Ok(PresenceSetting::Auto));
        assert_eq!("away".parse(), Ok(PresenceSetting::Locked(HomePresence::Away)));
        let err = "Home".parse::<PresenceSetting>().unwrap_err();
        assert_eq!(err, "Invalid presence value 'Home', must be one of 'auto', 'home' or 'away'.");
    }

    #[test]
    fn locking_and_unlocking_presence() {
        let fake = FakeTado::with_home(1, "Home");
        let mut diags = Diagnostics::default();

        let state = GeofencingResource.create(&mut diags, &fake, model("away")).unwrap();
        assert_eq!(state.presence, "away");
        assert_eq!(state.id.as_deref(), Some("Home"));
        assert_eq!(fake.home_state(1).unwrap().presence_locked, Some(true));

        let state = GeofencingResource
            .update(&mut diags, &fake, state, model("auto"))
            .unwrap();
        assert_eq!(state.presence, "auto");
        assert_eq!(fake.home_state(1).unwrap().presence_locked, Some(false));
        assert!(!diags.has_errors());
    }

    #[test]
    fn invalid_presence_is_rejected_before_any_call() {
        let fake = FakeTado::with_home(1, "Home");
        let mut diags = Diagnostics::default();
        assert!(GeofencingResource.validate(&mut diags, &model("sometimes")).is_none());
        assert!(GeofencingResource.create(&mut diags, &fake, model("sometimes")).is_none());
        assert_eq!(fake.home_state(1).unwrap().presence_locked, Some(false));
    }

    #[test]
    fn lock_without_presence_is_an_error() {
        let fake = FakeTado::with_home(1, "Home");
        fake.set_home_state(
            1,
            HomeState {
                presence: None,
                presence_locked: Some(true),
            },
        );
        let mut diags = Diagnostics::default();
        assert!(GeofencingResource.read(&mut diags, &fake, model("home")).is_none());
        let err = diags.iter().next().unwrap();
        assert_eq!(err.summary, "Tado API Error");
        assert!(err.detail.contains("without a presence"));
    }

    #[test]
    fn import_then_read() {
        let fake = FakeTado::with_home(1, "Home");
        let mut diags = Diagnostics::default();
        let partial = GeofencingResource.import(&mut diags, "Home").unwrap();
        let state = GeofencingResource.read(&mut diags, &fake, partial).unwrap();
        assert_eq!(state.presence, "auto");
        assert!(GeofencingResource.delete(&mut diags, &fake, state).is_some());
    }
}
