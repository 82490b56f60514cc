use crate::client::{TadoApi, TadoClientError};
use crate::models::tado::{Home, HomeId, Zone, ZoneId};
use core::fmt;
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Errors that can occur while resolving a home or zone by name.
#[derive(Debug)]
pub enum LookupError {
    /// Underlying API client error
    Api(TadoClientError),
    /// No home with this name is visible to the account
    HomeNotFound(String),
    /// The home has no zone with this name
    ZoneNotFound { home_id: HomeId, zone: String },
    /// The API returned the entity without an id
    MissingId(String),
}

impl Display for LookupError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            LookupError::Api(e) => write!(f, "api error: {}", e),
            LookupError::HomeNotFound(name) => write!(f, "home '{}' not found", name),
            LookupError::ZoneNotFound { home_id, zone } => {
                write!(f, "zone '{}' not found in home {}", zone, home_id.0)
            }
            LookupError::MissingId(name) => write!(f, "'{}' has no id", name),
        }
    }
}

impl Error for LookupError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            LookupError::Api(e) => Some(e),
            _ => None,
        }
    }
}

impl From<TadoClientError> for LookupError {
    fn from(value: TadoClientError) -> Self {
        LookupError::Api(value)
    }
}

/// Resolve a home by its display name among the homes of the authenticated user.
pub fn find_home(api: &dyn TadoApi, name: &str) -> Result<(HomeId, Home), LookupError> {
    let me = api.get_me()?;
    let base = me
        .homes
        .unwrap_or_default()
        .into_iter()
        .find(|h| h.name.as_deref() == Some(name))
        .ok_or_else(|| LookupError::HomeNotFound(name.to_string()))?;
    let home_id = base.id.ok_or_else(|| LookupError::MissingId(name.to_string()))?;
    Ok((home_id, api.get_home(home_id)?))
}

/// Resolve a zone by its display name within a home.
pub fn find_zone(api: &dyn TadoApi, home_id: HomeId, name: &str) -> Result<(ZoneId, Zone), LookupError> {
    let zone = api
        .get_zones(home_id)?
        .into_iter()
        .find(|z| z.name.as_deref() == Some(name))
        .ok_or_else(|| LookupError::ZoneNotFound {
            home_id,
            zone: name.to_string(),
        })?;
    let zone_id = zone.id.ok_or_else(|| LookupError::MissingId(name.to_string()))?;
    Ok((zone_id, zone))
}

/// Serialize a serde-backed enum into its string name (e.g. SCREAMING_SNAKE_CASE).
pub fn serde_enum_name<T: Serialize>(val: &T) -> Option<String> {
    serde_json::to_value(val).ok()?.as_str().map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::tado::{DayType, HomePresence, ZoneType};
    use crate::testing::FakeTado;

    #[test]
    fn enum_names_follow_wire_form() {
        assert_eq!(serde_enum_name(&ZoneType::HotWater).as_deref(), Some("HOT_WATER"));
        assert_eq!(serde_enum_name(&HomePresence::Away).as_deref(), Some("AWAY"));
        assert_eq!(serde_enum_name(&DayType::MondayToSunday).as_deref(), Some("MONDAY_TO_SUNDAY"));
        assert_eq!(serde_enum_name(&42), None);
    }

    #[test]
    fn resolves_home_and_zone_by_name() {
        let fake = FakeTado::with_home(7, "Chalet").with_zone(7, 3, "Living Room");
        let (home_id, home) = find_home(&fake, "Chalet").unwrap();
        assert_eq!(home_id, HomeId(7));
        assert_eq!(home.base.name.as_deref(), Some("Chalet"));
        let (zone_id, zone) = find_zone(&fake, HomeId(7), "Living Room").unwrap();
        assert_eq!(zone_id, ZoneId(3));
        assert_eq!(zone.name.as_deref(), Some("Living Room"));
    }

    #[test]
    fn unknown_names_are_reported() {
        let fake = FakeTado::with_home(7, "Chalet");
        assert!(matches!(find_home(&fake, "Castle"), Err(LookupError::HomeNotFound(n)) if n == "Castle"));
        assert!(matches!(
            find_zone(&fake, HomeId(7), "Attic"),
            Err(LookupError::ZoneNotFound { home_id: HomeId(7), .. })
        ));
    }
}
