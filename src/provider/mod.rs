//! Provider configuration, lifecycle seams and the registry of resources and data sources.
//!
//! Lifecycle methods follow the plugin host's conventions: problems are recorded in
//! [`Diagnostics`] and the method returns `None` when it could not produce a result.

pub mod geofencing;
pub mod heating_schedule;
pub mod home;
pub mod zone;

use crate::client::{TadoApi, TadoClient};
use crate::config::Config;
use crate::models::tado::{Home, HomeId, Zone, ZoneId};
use crate::token::read_token;
use crate::utils::{find_home, find_zone};
use log::info;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;

// =====================
// Diagnostics
// =====================

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub summary: String,
    pub detail: String,
}

#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn add_error(&mut self, summary: impl Into<String>, detail: impl Into<String>) {
        self.items.push(Diagnostic {
            severity: Severity::Error,
            summary: summary.into(),
            detail: detail.into(),
        });
    }

    pub fn add_warning(&mut self, summary: impl Into<String>, detail: impl Into<String>) {
        self.items.push(Diagnostic {
            severity: Severity::Warning,
            summary: summary.into(),
            detail: detail.into(),
        });
    }

    pub fn has_errors(&self) -> bool {
        self.items.iter().any(|d| d.severity == Severity::Error)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    /// Turn the client's pending warnings (token persistence failures) into diagnostics.
    pub fn collect_client_warnings(&mut self, api: &dyn TadoApi) {
        for msg in api.drain_warnings() {
            self.add_warning("Unable to update token", msg);
        }
    }
}

// =====================
// Schemas
// =====================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeType {
    String,
    Int64,
    Float64,
    Bool,
    ListNested(Vec<Attribute>),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeMode {
    Required,
    Optional,
    Computed,
    OptionalComputed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attribute {
    pub name: &'static str,
    pub r#type: AttributeType,
    pub mode: AttributeMode,
    pub sensitive: bool,
    pub description: &'static str,
}

impl Attribute {
    fn new(name: &'static str, r#type: AttributeType, mode: AttributeMode, description: &'static str) -> Self {
        Attribute {
            name,
            r#type,
            mode,
            sensitive: false,
            description,
        }
    }

    pub fn required(name: &'static str, r#type: AttributeType, description: &'static str) -> Self {
        Self::new(name, r#type, AttributeMode::Required, description)
    }

    pub fn optional(name: &'static str, r#type: AttributeType, description: &'static str) -> Self {
        Self::new(name, r#type, AttributeMode::Optional, description)
    }

    pub fn computed(name: &'static str, r#type: AttributeType, description: &'static str) -> Self {
        Self::new(name, r#type, AttributeMode::Computed, description)
    }

    pub fn optional_computed(name: &'static str, r#type: AttributeType, description: &'static str) -> Self {
        Self::new(name, r#type, AttributeMode::OptionalComputed, description)
    }

    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Schema {
    pub description: &'static str,
    pub attributes: Vec<Attribute>,
}

// =====================
// Lifecycle seams
// =====================

pub trait DataSource {
    type Model: Serialize + DeserializeOwned;

    fn type_name(&self) -> &'static str;

    fn schema(&self) -> Schema;

    fn read(&self, diags: &mut Diagnostics, api: &dyn TadoApi, config: Self::Model) -> Option<Self::Model>;
}

pub trait Resource {
    type Model: Serialize + DeserializeOwned;

    fn type_name(&self) -> &'static str;

    fn schema(&self) -> Schema;

    /// Offline checks on a configuration.
    fn validate(&self, _diags: &mut Diagnostics, _config: &Self::Model) -> Option<()> {
        Some(())
    }

    fn create(&self, diags: &mut Diagnostics, api: &dyn TadoApi, config: Self::Model) -> Option<Self::Model>;

    fn read(&self, diags: &mut Diagnostics, api: &dyn TadoApi, state: Self::Model) -> Option<Self::Model>;

    fn update(
        &self,
        diags: &mut Diagnostics,
        api: &dyn TadoApi,
        prior: Self::Model,
        planned: Self::Model,
    ) -> Option<Self::Model>;

    fn delete(&self, diags: &mut Diagnostics, api: &dyn TadoApi, state: Self::Model) -> Option<()>;

    /// Build a partial state from an import ID; the host reads it afterwards.
    fn import(&self, diags: &mut Diagnostics, id: &str) -> Option<Self::Model>;
}

/// Object-safe view of a [`DataSource`] over JSON documents.
pub trait DynamicDataSource {
    fn type_name(&self) -> &'static str;

    fn schema(&self) -> Schema;

    fn read(&self, diags: &mut Diagnostics, api: &dyn TadoApi, config: Value) -> Option<Value>;
}

/// Object-safe view of a [`Resource`] over JSON documents.
pub trait DynamicResource {
    fn type_name(&self) -> &'static str;

    fn schema(&self) -> Schema;

    fn validate(&self, diags: &mut Diagnostics, config: Value) -> Option<()>;

    fn create(&self, diags: &mut Diagnostics, api: &dyn TadoApi, config: Value) -> Option<Value>;

    fn read(&self, diags: &mut Diagnostics, api: &dyn TadoApi, state: Value) -> Option<Value>;

    fn update(&self, diags: &mut Diagnostics, api: &dyn TadoApi, prior: Value, planned: Value) -> Option<Value>;

    fn delete(&self, diags: &mut Diagnostics, api: &dyn TadoApi, state: Value) -> Option<()>;

    fn import(&self, diags: &mut Diagnostics, id: &str) -> Option<Value>;
}

/// Decode a document, reporting the path of the offending attribute on failure.
fn decode<M: DeserializeOwned>(diags: &mut Diagnostics, what: &str, value: Value) -> Option<M> {
    match serde_path_to_error::deserialize(value) {
        Ok(model) => Some(model),
        Err(e) => {
            diags.add_error(
                format!("Invalid {}", what),
                format!("attribute '{}': {}", e.path(), e.inner()),
            );
            None
        }
    }
}

fn encode<M: Serialize>(diags: &mut Diagnostics, model: M) -> Option<Value> {
    match serde_json::to_value(model) {
        Ok(v) => Some(v),
        Err(e) => {
            diags.add_error("Unable to encode state", e.to_string());
            None
        }
    }
}

impl<T: DataSource> DynamicDataSource for T {
    fn type_name(&self) -> &'static str {
        DataSource::type_name(self)
    }

    fn schema(&self) -> Schema {
        DataSource::schema(self)
    }

    fn read(&self, diags: &mut Diagnostics, api: &dyn TadoApi, config: Value) -> Option<Value> {
        let config = decode(diags, "configuration", config)?;
        let state = DataSource::read(self, diags, api, config);
        diags.collect_client_warnings(api);
        encode(diags, state?)
    }
}

impl<T: Resource> DynamicResource for T {
    fn type_name(&self) -> &'static str {
        Resource::type_name(self)
    }

    fn schema(&self) -> Schema {
        Resource::schema(self)
    }

    fn validate(&self, diags: &mut Diagnostics, config: Value) -> Option<()> {
        let config: T::Model = decode(diags, "configuration", config)?;
        Resource::validate(self, diags, &config)
    }

    fn create(&self, diags: &mut Diagnostics, api: &dyn TadoApi, config: Value) -> Option<Value> {
        let config: T::Model = decode(diags, "configuration", config)?;
        Resource::validate(self, diags, &config)?;
        let state = Resource::create(self, diags, api, config);
        diags.collect_client_warnings(api);
        encode(diags, state?)
    }

    fn read(&self, diags: &mut Diagnostics, api: &dyn TadoApi, state: Value) -> Option<Value> {
        let state = decode(diags, "state", state)?;
        let state = Resource::read(self, diags, api, state);
        diags.collect_client_warnings(api);
        encode(diags, state?)
    }

    fn update(&self, diags: &mut Diagnostics, api: &dyn TadoApi, prior: Value, planned: Value) -> Option<Value> {
        let prior = decode(diags, "state", prior)?;
        let planned: T::Model = decode(diags, "plan", planned)?;
        Resource::validate(self, diags, &planned)?;
        let state = Resource::update(self, diags, api, prior, planned);
        diags.collect_client_warnings(api);
        encode(diags, state?)
    }

    fn delete(&self, diags: &mut Diagnostics, api: &dyn TadoApi, state: Value) -> Option<()> {
        let state = decode(diags, "state", state)?;
        let done = Resource::delete(self, diags, api, state);
        diags.collect_client_warnings(api);
        done
    }

    fn import(&self, diags: &mut Diagnostics, id: &str) -> Option<Value> {
        let state = Resource::import(self, diags, id)?;
        encode(diags, state)
    }
}

// =====================
// Shared lookups
// =====================

pub(crate) fn lookup_home(diags: &mut Diagnostics, api: &dyn TadoApi, name: &str) -> Option<(HomeId, Home)> {
    match find_home(api, name) {
        Ok(found) => Some(found),
        Err(e) => {
            diags.add_error("Tado API Error", format!("Unable to get home '{}': {}", name, e));
            None
        }
    }
}

pub(crate) fn lookup_zone(
    diags: &mut Diagnostics,
    api: &dyn TadoApi,
    home_id: HomeId,
    name: &str,
) -> Option<(ZoneId, Zone)> {
    match find_zone(api, home_id, name) {
        Ok(found) => Some(found),
        Err(e) => {
            diags.add_error("Tado API Error", format!("Unable to get zone '{}': {}", name, e));
            None
        }
    }
}

// =====================
// Provider
// =====================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Token file location. Falls back to `TADO_TOKEN_PATH`.
    #[serde(default)]
    pub token_path: Option<String>,
}

#[derive(Debug, Default, Clone)]
pub struct TadoProvider {}

impl TadoProvider {
    pub fn schema(&self) -> Schema {
        Schema {
            description: "Manage a tado° smart heating account.",
            attributes: vec![Attribute::optional(
                "token_path",
                AttributeType::String,
                "Path of the file the OAuth token is stored in. Can be set via environment variable `TADO_TOKEN_PATH`.",
            )],
        }
    }

    pub fn resources(&self) -> BTreeMap<&'static str, Box<dyn DynamicResource>> {
        let list: Vec<Box<dyn DynamicResource>> = vec![
            Box::new(geofencing::GeofencingResource),
            Box::new(heating_schedule::HeatingScheduleResource),
        ];
        list.into_iter().map(|r| (r.type_name(), r)).collect()
    }

    pub fn data_sources(&self) -> BTreeMap<&'static str, Box<dyn DynamicDataSource>> {
        let list: Vec<Box<dyn DynamicDataSource>> =
            vec![Box::new(home::HomeDataSource), Box::new(zone::ZoneDataSource)];
        list.into_iter().map(|d| (d.type_name(), d)).collect()
    }

    pub fn token_path(config: &ProviderConfig, env: &Config) -> PathBuf {
        match config.token_path.as_deref() {
            Some(p) if !p.trim().is_empty() => PathBuf::from(p.trim()),
            _ => env.token_path.clone(),
        }
    }

    /// Build an authenticated client from the persisted token, logging in when there is none.
    pub fn configure(&self, diags: &mut Diagnostics, config: &ProviderConfig, env: &Config) -> Option<TadoClient> {
        let token_path = Self::token_path(config, env);
        match read_token(&token_path) {
            Ok(Some(token)) => {
                info!("Using token from {}", token_path.display());
                Some(TadoClient::from_token(token, Some(token_path), env.http_timeout))
            }
            Ok(None) => {
                info!("No token at {}; starting device login", token_path.display());
                Self::login(diags, token_path, env)
            }
            Err(e) => {
                diags.add_error(
                    "Unable to read token",
                    format!("Failed to read token from {}: {}", token_path.display(), e),
                );
                None
            }
        }
    }

    /// Run the device authorization flow and persist the token.
    pub fn login(diags: &mut Diagnostics, token_path: PathBuf, env: &Config) -> Option<TadoClient> {
        let result = TadoClient::device_login(Some(token_path), env.http_timeout, |auth| {
            let url = auth
                .verification_uri_complete
                .as_deref()
                .or(auth.verification_uri.as_deref())
                .unwrap_or("https://login.tado.com/oauth2/device");
            info!("Visit {} and confirm code {} to authorize this provider", url, auth.user_code);
        });
        match result {
            Ok(client) => Some(client),
            Err(e) => {
                diags.add_error("Tado Authentication Error", format!("Unable to authenticate with tado: {}", e));
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeTado;
    use serde_json::json;

    #[test]
    fn registry_exposes_all_types() {
        let provider = TadoProvider::default();
        let resources: Vec<_> = provider.resources().keys().copied().collect();
        assert_eq!(resources, vec!["tado_geofencing", "tado_heating_schedule"]);
        let data_sources: Vec<_> = provider.data_sources().keys().copied().collect();
        assert_eq!(data_sources, vec!["tado_home", "tado_zone"]);
    }

    #[test]
    fn malformed_document_reports_attribute_path() {
        let provider = TadoProvider::default();
        let resources = provider.resources();
        let geofencing = &resources["tado_geofencing"];
        let mut diags = Diagnostics::default();
        let config = json!({"home_name": "Home", "presence": 5});
        assert!(geofencing.validate(&mut diags, config).is_none());
        let err = diags.iter().next().expect("one diagnostic");
        assert_eq!(err.severity, Severity::Error);
        assert!(err.detail.starts_with("attribute 'presence'"), "detail was {}", err.detail);
    }

    #[test]
    fn client_warnings_become_diagnostics() {
        let fake = FakeTado::with_home(1, "Home");
        fake.push_warning("Failed to update token at /ro/token.json: permission denied");
        let provider = TadoProvider::default();
        let data_sources = provider.data_sources();
        let mut diags = Diagnostics::default();
        let state = data_sources["tado_home"].read(&mut diags, &fake, json!({"name": "Home"}));
        assert!(state.is_some());
        assert!(!diags.has_errors());
        let warning = diags.iter().next().expect("warning recorded");
        assert_eq!(warning.severity, Severity::Warning);
        assert_eq!(warning.summary, "Unable to update token");
    }

    #[test]
    fn provider_token_path_overrides_environment() {
        let env = Config {
            token_path: PathBuf::from("env-token.json"),
            http_timeout: std::time::Duration::from_secs(1),
        };
        let explicit = ProviderConfig {
            token_path: Some("/etc/tado/token.json".to_string()),
        };
        assert_eq!(TadoProvider::token_path(&explicit, &env), PathBuf::from("/etc/tado/token.json"));
        assert_eq!(
            TadoProvider::token_path(&ProviderConfig::default(), &env),
            PathBuf::from("env-token.json")
        );
    }

    #[test]
    fn unreadable_token_file_is_an_error() {
        let dir = std::env::temp_dir().join(format!("tado-provider-configure-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("token.json");
        std::fs::write(&path, "{ not json").unwrap();
        let env = Config {
            token_path: path,
            http_timeout: std::time::Duration::from_secs(1),
        };
        let mut diags = Diagnostics::default();
        assert!(
            TadoProvider::default()
                .configure(&mut diags, &ProviderConfig::default(), &env)
                .is_none()
        );
        assert!(diags.has_errors());
    }
}
