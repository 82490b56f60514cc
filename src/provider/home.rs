use super::{Attribute, AttributeType, DataSource, Diagnostics, Schema, lookup_home};
use crate::client::TadoApi;
use crate::utils::serde_enum_name;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HomeModel {
    #[serde(default)]
    pub id: Option<i64>,
    pub name: String,
    #[serde(default)]
    pub temperature_unit: Option<String>,
    #[serde(default)]
    pub contact_name: Option<String>,
    #[serde(default)]
    pub contact_email: Option<String>,
    #[serde(default)]
    pub contact_phone: Option<String>,
    #[serde(default)]
    pub address_line1: Option<String>,
    #[serde(default)]
    pub address_line2: Option<String>,
    #[serde(default)]
    pub address_zipcode: Option<String>,
    #[serde(default)]
    pub address_city: Option<String>,
    #[serde(default)]
    pub address_state: Option<String>,
    #[serde(default)]
    pub address_country: Option<String>,
    #[serde(default)]
    pub geolocation_lat: Option<f64>,
    #[serde(default)]
    pub geolocation_long: Option<f64>,
}

/// `tado_home`: a home of the account, looked up by name.
pub struct HomeDataSource;

impl DataSource for HomeDataSource {
    type Model = HomeModel;

    fn type_name(&self) -> &'static str {
        "tado_home"
    }

    fn schema(&self) -> Schema {
        use AttributeType::*;
        Schema {
            description: "A tado° home.",
            attributes: vec![
                Attribute::computed("id", Int64, "Home ID."),
                Attribute::required("name", String, "Home name."),
                Attribute::computed("temperature_unit", String, "Temperature unit (CELSIUS or FAHRENHEIT)."),
                Attribute::computed("contact_name", String, "Contact name."),
                Attribute::computed("contact_email", String, "Contact email.").sensitive(),
                Attribute::computed("contact_phone", String, "Contact phone.").sensitive(),
                Attribute::computed("address_line1", String, "Address line 1."),
                Attribute::computed("address_line2", String, "Address line 2."),
                Attribute::computed("address_zipcode", String, "Zip code."),
                Attribute::computed("address_city", String, "City."),
                Attribute::computed("address_state", String, "State."),
                Attribute::computed("address_country", String, "Country."),
                Attribute::computed("geolocation_lat", Float64, "Latitude."),
                Attribute::computed("geolocation_long", Float64, "Longitude."),
            ],
        }
    }

    fn read(&self, diags: &mut Diagnostics, api: &dyn TadoApi, config: HomeModel) -> Option<HomeModel> {
        let (home_id, home) = lookup_home(diags, api, &config.name)?;
        let contact = home.contact_details.unwrap_or_default();
        let address = home.address.unwrap_or_default();
        let geolocation = home.geolocation.unwrap_or_default();
        Some(HomeModel {
            id: Some(home_id.0),
            name: config.name,
            temperature_unit: home.temperature_unit.as_ref().and_then(serde_enum_name),
            contact_name: contact.name,
            contact_email: contact.email,
            contact_phone: contact.phone,
            address_line1: address.address_line1,
            address_line2: address.address_line2,
            address_zipcode: address.zip_code,
            address_city: address.city,
            address_state: address.state,
            address_country: address.country,
            geolocation_lat: geolocation.latitude,
            geolocation_long: geolocation.longitude,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeTado;

    fn config(name: &str) -> HomeModel {
        HomeModel {
            name: name.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn reads_home_attributes() {
        let fake = FakeTado::with_home(12, "Chalet");
        let mut diags = Diagnostics::default();
        let state = HomeDataSource.read(&mut diags, &fake, config("Chalet")).unwrap();
        assert!(!diags.has_errors());
        assert_eq!(state.id, Some(12));
        assert_eq!(state.temperature_unit.as_deref(), Some("CELSIUS"));
        assert_eq!(state.contact_email.as_deref(), Some("alex@example.com"));
        assert_eq!(state.address_zipcode.as_deref(), Some("8001"));
        assert_eq!(state.address_line2, None);
        assert_eq!(state.geolocation_lat, Some(47.37));
    }

    #[test]
    fn unknown_home_is_an_error() {
        let fake = FakeTado::with_home(12, "Chalet");
        let mut diags = Diagnostics::default();
        assert!(HomeDataSource.read(&mut diags, &fake, config("Castle")).is_none());
        let err = diags.iter().next().unwrap();
        assert_eq!(err.summary, "Tado API Error");
        assert!(err.detail.contains("Castle"));
    }
}
