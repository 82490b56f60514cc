//! In-memory tado account for unit tests.

use crate::client::{TadoApi, TadoClientError};
use crate::models::tado::*;
use std::cell::RefCell;
use std::collections::BTreeMap;

#[derive(Default)]
struct FakeState {
    homes: Vec<Home>,
    zones: BTreeMap<i64, Vec<Zone>>,
    home_states: BTreeMap<i64, HomeState>,
    early_start: BTreeMap<i64, bool>,
    active: BTreeMap<i64, TimetableTypeId>,
    blocks: BTreeMap<(i64, i32), Vec<TimetableBlock>>,
    block_writes: Vec<DayType>,
    fail_activation: bool,
    warnings: Vec<String>,
}

/// Answers [`TadoApi`] calls from state seeded by the test.
#[derive(Default)]
pub struct FakeTado {
    state: RefCell<FakeState>,
}

impl FakeTado {
    pub fn with_home(id: i64, name: &str) -> Self {
        let fake = FakeTado::default();
        fake.add_home(id, name);
        fake
    }

    pub fn add_home(&self, id: i64, name: &str) {
        let mut s = self.state.borrow_mut();
        s.homes.push(Home {
            base: HomeBase {
                id: Some(HomeId(id)),
                name: Some(name.to_string()),
            },
            temperature_unit: Some(TemperatureUnit::Celsius),
            contact_details: Some(HomeContactDetails {
                name: Some("Alex Doe".to_string()),
                email: Some("alex@example.com".to_string()),
                phone: None,
            }),
            address: Some(HomeAddress {
                address_line1: Some("Bahnhofstrasse 1".to_string()),
                zip_code: Some("8001".to_string()),
                city: Some("Zurich".to_string()),
                country: Some("CHE".to_string()),
                ..Default::default()
            }),
            geolocation: Some(HomeGeolocation {
                latitude: Some(47.37),
                longitude: Some(8.54),
            }),
            ..Default::default()
        });
        s.home_states.insert(
            id,
            HomeState {
                presence: Some(HomePresence::Home),
                presence_locked: Some(false),
            },
        );
    }

    pub fn with_zone(self, home_id: i64, zone_id: i64, name: &str) -> Self {
        self.state.borrow_mut().zones.entry(home_id).or_default().push(Zone {
            id: Some(ZoneId(zone_id)),
            name: Some(name.to_string()),
            r#type: Some(ZoneType::Heating),
            dazzle_mode: Some(ZoneDazzleMode {
                supported: Some(true),
                enabled: Some(true),
            }),
            open_window_detection: Some(ZoneOpenWindowDetection {
                supported: Some(true),
                enabled: Some(false),
                timeout_in_seconds: Some(900),
            }),
            ..Default::default()
        });
        self
    }

    pub fn set_early_start(&self, zone_id: i64, enabled: bool) {
        self.state.borrow_mut().early_start.insert(zone_id, enabled);
    }

    pub fn set_home_state(&self, home_id: i64, state: HomeState) {
        self.state.borrow_mut().home_states.insert(home_id, state);
    }

    pub fn fail_timetable_activation(&self) {
        self.state.borrow_mut().fail_activation = true;
    }

    pub fn push_warning(&self, msg: &str) {
        self.state.borrow_mut().warnings.push(msg.to_string());
    }

    pub fn active_timetable(&self, zone_id: ZoneId) -> Option<TimetableTypeId> {
        self.state.borrow().active.get(&zone_id.0).copied()
    }

    /// Day types passed to `set_timetable_blocks`, in call order.
    pub fn block_writes(&self) -> Vec<DayType> {
        self.state.borrow().block_writes.clone()
    }

    pub fn home_state(&self, home_id: i64) -> Option<HomeState> {
        self.state.borrow().home_states.get(&home_id).cloned()
    }

    fn not_found(what: String) -> TadoClientError {
        TadoClientError::Http {
            status: 404,
            message: what,
        }
    }
}

impl TadoApi for FakeTado {
    fn get_me(&self) -> Result<User, TadoClientError> {
        let s = self.state.borrow();
        Ok(User {
            name: Some("Alex Doe".to_string()),
            homes: Some(s.homes.iter().map(|h| h.base.clone()).collect()),
            ..Default::default()
        })
    }

    fn get_home(&self, home_id: HomeId) -> Result<Home, TadoClientError> {
        self.state
            .borrow()
            .homes
            .iter()
            .find(|h| h.base.id == Some(home_id))
            .cloned()
            .ok_or_else(|| Self::not_found(format!("home {}", home_id.0)))
    }

    fn get_home_state(&self, home_id: HomeId) -> Result<HomeState, TadoClientError> {
        self.home_state(home_id.0)
            .ok_or_else(|| Self::not_found(format!("home {}", home_id.0)))
    }

    fn set_presence_lock(&self, home_id: HomeId, presence: HomePresence) -> Result<(), TadoClientError> {
        let mut s = self.state.borrow_mut();
        let state = s
            .home_states
            .get_mut(&home_id.0)
            .ok_or_else(|| Self::not_found(format!("home {}", home_id.0)))?;
        state.presence = Some(presence);
        state.presence_locked = Some(true);
        Ok(())
    }

    fn delete_presence_lock(&self, home_id: HomeId) -> Result<(), TadoClientError> {
        let mut s = self.state.borrow_mut();
        let state = s
            .home_states
            .get_mut(&home_id.0)
            .ok_or_else(|| Self::not_found(format!("home {}", home_id.0)))?;
        state.presence_locked = Some(false);
        Ok(())
    }

    fn get_zones(&self, home_id: HomeId) -> Result<Vec<Zone>, TadoClientError> {
        Ok(self.state.borrow().zones.get(&home_id.0).cloned().unwrap_or_default())
    }

    fn get_early_start(&self, _home_id: HomeId, zone_id: ZoneId) -> Result<EarlyStart, TadoClientError> {
        Ok(EarlyStart {
            enabled: Some(self.state.borrow().early_start.get(&zone_id.0).copied().unwrap_or(true)),
        })
    }

    fn get_active_timetable(&self, _home_id: HomeId, zone_id: ZoneId) -> Result<TimetableType, TadoClientError> {
        let id = self
            .active_timetable(zone_id)
            .ok_or_else(|| Self::not_found(format!("timetable of zone {}", zone_id.0)))?;
        Ok(TimetableType {
            id: Some(id),
            r#type: None,
        })
    }

    fn set_active_timetable(
        &self,
        _home_id: HomeId,
        zone_id: ZoneId,
        timetable: TimetableTypeId,
    ) -> Result<TimetableType, TadoClientError> {
        let mut s = self.state.borrow_mut();
        if s.fail_activation {
            return Err(TadoClientError::Http {
                status: 500,
                message: "internal error".to_string(),
            });
        }
        s.active.insert(zone_id.0, timetable);
        Ok(TimetableType {
            id: Some(timetable),
            r#type: None,
        })
    }

    fn get_timetable_blocks(
        &self,
        _home_id: HomeId,
        zone_id: ZoneId,
        timetable: TimetableTypeId,
    ) -> Result<Vec<TimetableBlock>, TadoClientError> {
        Ok(self
            .state
            .borrow()
            .blocks
            .get(&(zone_id.0, timetable.as_i32()))
            .cloned()
            .unwrap_or_default())
    }

    fn set_timetable_blocks(
        &self,
        _home_id: HomeId,
        zone_id: ZoneId,
        timetable: TimetableTypeId,
        day_type: DayType,
        blocks: &[TimetableBlock],
    ) -> Result<(), TadoClientError> {
        let mut s = self.state.borrow_mut();
        s.block_writes.push(day_type);
        let stored = s.blocks.entry((zone_id.0, timetable.as_i32())).or_default();
        stored.retain(|b| b.day_type != Some(day_type));
        stored.extend_from_slice(blocks);
        Ok(())
    }

    fn drain_warnings(&self) -> Vec<String> {
        std::mem::take(&mut self.state.borrow_mut().warnings)
    }
}
