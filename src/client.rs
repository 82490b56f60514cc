//! Blocking HTTP client for the tado° API (the endpoints the provider needs).
//!
//! - Blocking client using `ureq` (no async).
//! - Models live in `crate::models::tado`.
//! - [`TadoApi`] is the seam the provider layer and the schedule converter call through.
//!
//! Authentication
//! - OAuth2 device authorization grant against tado's login service.
//! - Access tokens are refreshed automatically; refreshed tokens are written back to the token file.

use chrono::Utc;
use http::{Response, StatusCode};
use log::{debug, info, warn};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::cell::RefCell;
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};
use ureq::Body;

use crate::models::tado::*;
use crate::token::{OAuthToken, TokenFileError, write_token};
use crate::utils::serde_enum_name;

const BASE_URL: &str = "https://my.tado.com/api/v2";
const OAUTH_DEVICE_URL: &str = "https://login.tado.com/oauth2/device_authorize";
const OAUTH_TOKEN_URL: &str = "https://login.tado.com/oauth2/token";
const OAUTH_CLIENT_ID: &str = "1bb50063-6b0c-4d11-bd99-387f4a91cc46";
const OAUTH_SCOPE: &str = "offline_access";
const DEVICE_CODE_GRANT: &str = "urn:ietf:params:oauth:grant-type:device_code";

#[derive(Debug)]
pub enum TadoClientError {
    Transport(String),
    Http { status: u16, message: String },
    Json(serde_json::Error),
    Auth(String),
    TokenFile(TokenFileError),
}

impl core::fmt::Display for TadoClientError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            TadoClientError::Transport(s) => write!(f, "transport error: {}", s),
            TadoClientError::Http { status, message } => write!(f, "http {}: {}", status, message),
            TadoClientError::Json(e) => write!(f, "json error: {}", e),
            TadoClientError::Auth(e) => write!(f, "auth error: {}", e),
            TadoClientError::TokenFile(e) => write!(f, "token file error: {}", e),
        }
    }
}

impl std::error::Error for TadoClientError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TadoClientError::Json(e) => Some(e),
            TadoClientError::TokenFile(e) => Some(e),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for TadoClientError {
    fn from(value: serde_json::Error) -> Self {
        TadoClientError::Json(value)
    }
}

impl From<ureq::Error> for TadoClientError {
    fn from(value: ureq::Error) -> Self {
        TadoClientError::Transport(value.to_string())
    }
}

impl From<TokenFileError> for TadoClientError {
    fn from(value: TokenFileError) -> Self {
        TadoClientError::TokenFile(value)
    }
}

/// Operations the provider performs against a tado account.
pub trait TadoApi {
    fn get_me(&self) -> Result<User, TadoClientError>;

    fn get_home(&self, home_id: HomeId) -> Result<Home, TadoClientError>;

    fn get_home_state(&self, home_id: HomeId) -> Result<HomeState, TadoClientError>;

    fn set_presence_lock(&self, home_id: HomeId, presence: HomePresence) -> Result<(), TadoClientError>;

    /// Removing the lock hands presence back to geofencing.
    fn delete_presence_lock(&self, home_id: HomeId) -> Result<(), TadoClientError>;

    fn get_zones(&self, home_id: HomeId) -> Result<Vec<Zone>, TadoClientError>;

    fn get_early_start(&self, home_id: HomeId, zone_id: ZoneId) -> Result<EarlyStart, TadoClientError>;

    fn get_active_timetable(&self, home_id: HomeId, zone_id: ZoneId) -> Result<TimetableType, TadoClientError>;

    fn set_active_timetable(
        &self,
        home_id: HomeId,
        zone_id: ZoneId,
        timetable: TimetableTypeId,
    ) -> Result<TimetableType, TadoClientError>;

    fn get_timetable_blocks(
        &self,
        home_id: HomeId,
        zone_id: ZoneId,
        timetable: TimetableTypeId,
    ) -> Result<Vec<TimetableBlock>, TadoClientError>;

    /// Replaces every block of `day_type` in the timetable.
    fn set_timetable_blocks(
        &self,
        home_id: HomeId,
        zone_id: ZoneId,
        timetable: TimetableTypeId,
        day_type: DayType,
        blocks: &[TimetableBlock],
    ) -> Result<(), TadoClientError>;

    /// Non-fatal problems collected since the last call (e.g. token file writes that failed).
    fn drain_warnings(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Device authorization issued by the login service. The user confirms it in a browser.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct DeviceAuthorization {
    pub device_code: String,
    pub user_code: String,
    pub verification_uri: Option<String>,
    pub verification_uri_complete: Option<String>,
    pub expires_in: u64,
    #[serde(default = "default_poll_interval")]
    pub interval: u64,
}

fn default_poll_interval() -> u64 {
    5
}

#[derive(serde::Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    token_type: Option<String>,
    expires_in: i64,
    #[serde(default)]
    refresh_token: Option<String>,
}

impl TokenResponse {
    /// A refresh response may omit the refresh token; keep the previous one then.
    fn into_token(self, previous_refresh: Option<String>) -> OAuthToken {
        OAuthToken {
            access_token: self.access_token,
            token_type: self.token_type,
            refresh_token: self.refresh_token.or(previous_refresh),
            expiry: Utc::now() + chrono::Duration::seconds(self.expires_in),
        }
    }
}

#[derive(serde::Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

enum PollOutcome {
    Granted(OAuthToken),
    Pending,
    SlowDown,
}

#[derive(Debug)]
struct OAuthState {
    token: OAuthToken,
    token_path: Option<PathBuf>,
}

pub struct TadoClient {
    agent: ureq::Agent,
    oauth: RefCell<OAuthState>,
    warnings: RefCell<Vec<String>>,
}

impl TadoClient {
    /// Build a client around an existing (possibly expired) token.
    pub fn from_token(token: OAuthToken, token_path: Option<PathBuf>, timeout: Duration) -> Self {
        TadoClient {
            agent: Self::build_agent(timeout),
            oauth: RefCell::new(OAuthState { token, token_path }),
            warnings: RefCell::new(Vec::new()),
        }
    }

    /// Run the device authorization flow and persist the granted token.
    ///
    /// `prompt` receives the authorization so the caller can show the user where to confirm it.
    /// Blocks until the user confirms, denies, or the authorization expires.
    pub fn device_login<F>(token_path: Option<PathBuf>, timeout: Duration, prompt: F) -> Result<Self, TadoClientError>
    where
        F: FnOnce(&DeviceAuthorization),
    {
        let agent = Self::build_agent(timeout);
        let authorization = Self::request_device_authorization(&agent)?;
        prompt(&authorization);

        let deadline = Instant::now() + Duration::from_secs(authorization.expires_in);
        let mut interval = Duration::from_secs(authorization.interval);
        let token = loop {
            if Instant::now() >= deadline {
                return Err(TadoClientError::Auth("device authorization expired".to_string()));
            }
            thread::sleep(interval);
            match Self::poll_device_token(&agent, &authorization.device_code)? {
                PollOutcome::Granted(token) => break token,
                PollOutcome::Pending => debug!("Device authorization pending"),
                PollOutcome::SlowDown => {
                    interval += Duration::from_secs(5);
                    debug!("Device authorization asked to slow down; polling every {}s", interval.as_secs());
                }
            }
        };
        info!("Device authorization granted");

        if let Some(path) = token_path.as_deref() {
            write_token(&token, path)?;
            info!("Token written to {}", path.display());
        }

        Ok(TadoClient {
            agent,
            oauth: RefCell::new(OAuthState { token, token_path }),
            warnings: RefCell::new(Vec::new()),
        })
    }

    fn build_agent(timeout: Duration) -> ureq::Agent {
        let config = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(timeout))
            .build();
        config.into()
    }

    fn url(path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", BASE_URL, path)
        } else {
            format!("{}/{}", BASE_URL, path)
        }
    }

    fn request_device_authorization(agent: &ureq::Agent) -> Result<DeviceAuthorization, TadoClientError> {
        let res = agent
            .post(OAUTH_DEVICE_URL)
            .header("Accept", "application/json")
            .send_form([("client_id", OAUTH_CLIENT_ID), ("scope", OAUTH_SCOPE)])?;
        match Self::expect_success(res) {
            Ok(mut res) => Self::decode(&mut res),
            Err(TadoClientError::Http { status, message }) => {
                Err(TadoClientError::Auth(format!("device authorization failed: http {}: {}", status, message)))
            }
            Err(e) => Err(e),
        }
    }

    fn poll_device_token(agent: &ureq::Agent, device_code: &str) -> Result<PollOutcome, TadoClientError> {
        let mut res = agent
            .post(OAUTH_TOKEN_URL)
            .header("Accept", "application/json")
            .send_form([
                ("client_id", OAUTH_CLIENT_ID),
                ("device_code", device_code),
                ("grant_type", DEVICE_CODE_GRANT),
            ])?;
        if res.status().is_success() {
            let body: TokenResponse = Self::decode(&mut res)?;
            return Ok(PollOutcome::Granted(body.into_token(None)));
        }
        let status = res.status().as_u16();
        let text = Self::body_text(&mut res);
        classify_poll_error(status, &text)
    }

    fn refresh_grant(agent: &ureq::Agent, refresh: &str) -> Result<OAuthToken, TadoClientError> {
        let res = agent
            .post(OAUTH_TOKEN_URL)
            .header("Accept", "application/json")
            .send_form([
                ("client_id", OAUTH_CLIENT_ID),
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh),
            ])?;
        match Self::expect_success(res) {
            Ok(mut res) => {
                let body: TokenResponse = Self::decode(&mut res)?;
                Ok(body.into_token(Some(refresh.to_string())))
            }
            Err(TadoClientError::Http { status, message }) => {
                Err(TadoClientError::Auth(format!("token refresh failed: http {}: {}", status, message)))
            }
            Err(e) => Err(e),
        }
    }

    /// Refresh the access token and persist it. Persistence failures are kept as warnings.
    fn refresh(&self) -> Result<(), TadoClientError> {
        let mut s = self.oauth.borrow_mut();
        let refresh_token = s.token.refresh_token.clone().ok_or_else(|| {
            TadoClientError::Auth("access token expired and no refresh token is available; log in again".to_string())
        })?;
        let token = Self::refresh_grant(&self.agent, &refresh_token)?;
        debug!("Access token refreshed (expires {})", token.expiry);
        if let Some(path) = s.token_path.as_deref()
            && let Err(e) = write_token(&token, path)
        {
            let msg = format!("Failed to update token at {}: {}", path.display(), e);
            warn!("{}", msg);
            self.warnings.borrow_mut().push(msg);
        }
        s.token = token;
        Ok(())
    }

    fn get_bearer(&self) -> Result<String, TadoClientError> {
        let needs_refresh = self
            .oauth
            .borrow()
            .token
            .expires_within(Utc::now(), chrono::Duration::seconds(30));
        if needs_refresh {
            self.refresh()?;
        }
        Ok(format!("Bearer {}", self.oauth.borrow().token.access_token))
    }

    /// Send an authenticated request built by `send`; retry once on 401 after forcing a refresh.
    fn execute<F>(&self, send: F) -> Result<Response<Body>, TadoClientError>
    where
        F: Fn(&str) -> Result<Response<Body>, ureq::Error>,
    {
        let bearer = self.get_bearer()?;
        let res = send(&bearer)?;
        if res.status() != StatusCode::UNAUTHORIZED {
            return Self::expect_success(res);
        }

        debug!("Got 401; forcing token refresh and retrying once");
        self.refresh()?;
        let bearer = self.get_bearer()?;
        let res = send(&bearer)?;
        Self::expect_success(res)
    }

    fn expect_success(mut res: Response<Body>) -> Result<Response<Body>, TadoClientError> {
        if res.status().is_success() {
            return Ok(res);
        }
        let status = res.status().as_u16();
        let message = Self::body_text(&mut res);
        Err(TadoClientError::Http { status, message })
    }

    fn body_text(res: &mut Response<Body>) -> String {
        res.body_mut()
            .read_to_string()
            .unwrap_or_else(|_| String::from("<no body>"))
    }

    fn decode<T: DeserializeOwned>(res: &mut Response<Body>) -> Result<T, TadoClientError> {
        let text = res.body_mut().read_to_string()?;
        serde_json::from_str(&text).map_err(TadoClientError::Json)
    }

    fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, TadoClientError> {
        let url = Self::url(path);
        debug!("GET {}", url);
        let mut res = self.execute(|bearer| {
            self.agent
                .get(&url)
                .header("Accept", "application/json")
                .header("Authorization", bearer)
                .call()
        })?;
        Self::decode(&mut res)
    }

    fn put_json<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T, TadoClientError> {
        let url = Self::url(path);
        debug!("PUT {}", url);
        let mut res = self.execute(|bearer| {
            self.agent
                .put(&url)
                .header("Accept", "application/json")
                .header("Authorization", bearer)
                .send_json(body)
        })?;
        Self::decode(&mut res)
    }

    fn put_json_discard<B: Serialize>(&self, path: &str, body: &B) -> Result<(), TadoClientError> {
        let url = Self::url(path);
        debug!("PUT {}", url);
        self.execute(|bearer| {
            self.agent
                .put(&url)
                .header("Accept", "application/json")
                .header("Authorization", bearer)
                .send_json(body)
        })?;
        Ok(())
    }

    fn delete(&self, path: &str) -> Result<(), TadoClientError> {
        let url = Self::url(path);
        debug!("DELETE {}", url);
        self.execute(|bearer| self.agent.delete(&url).header("Authorization", bearer).call())?;
        Ok(())
    }
}

/// Map a non-success token poll response to the device flow's next step.
fn classify_poll_error(status: u16, body: &str) -> Result<PollOutcome, TadoClientError> {
    let Ok(err) = serde_json::from_str::<TokenErrorResponse>(body) else {
        return Err(TadoClientError::Http {
            status,
            message: body.to_string(),
        });
    };
    match err.error.as_str() {
        "authorization_pending" => Ok(PollOutcome::Pending),
        "slow_down" => Ok(PollOutcome::SlowDown),
        other => Err(TadoClientError::Auth(match err.error_description {
            Some(desc) => format!("{}: {}", other, desc),
            None => other.to_string(),
        })),
    }
}

fn day_type_segment(day_type: DayType) -> Result<String, TadoClientError> {
    serde_enum_name(&day_type).ok_or_else(|| TadoClientError::Transport(format!("unnamed day type {:?}", day_type)))
}

impl TadoApi for TadoClient {
    fn get_me(&self) -> Result<User, TadoClientError> {
        self.get_json("/me")
    }

    fn get_home(&self, home_id: HomeId) -> Result<Home, TadoClientError> {
        self.get_json(&format!("/homes/{}", home_id.0))
    }

    fn get_home_state(&self, home_id: HomeId) -> Result<HomeState, TadoClientError> {
        self.get_json(&format!("/homes/{}/state", home_id.0))
    }

    fn set_presence_lock(&self, home_id: HomeId, presence: HomePresence) -> Result<(), TadoClientError> {
        let body = PresenceLock {
            home_presence: Some(presence),
        };
        self.put_json_discard(&format!("/homes/{}/presenceLock", home_id.0), &body)
    }

    fn delete_presence_lock(&self, home_id: HomeId) -> Result<(), TadoClientError> {
        self.delete(&format!("/homes/{}/presenceLock", home_id.0))
    }

    fn get_zones(&self, home_id: HomeId) -> Result<Vec<Zone>, TadoClientError> {
        self.get_json(&format!("/homes/{}/zones", home_id.0))
    }

    fn get_early_start(&self, home_id: HomeId, zone_id: ZoneId) -> Result<EarlyStart, TadoClientError> {
        self.get_json(&format!("/homes/{}/zones/{}/earlyStart", home_id.0, zone_id.0))
    }

    fn get_active_timetable(&self, home_id: HomeId, zone_id: ZoneId) -> Result<TimetableType, TadoClientError> {
        self.get_json(&format!(
            "/homes/{}/zones/{}/schedule/activeTimetable",
            home_id.0, zone_id.0
        ))
    }

    fn set_active_timetable(
        &self,
        home_id: HomeId,
        zone_id: ZoneId,
        timetable: TimetableTypeId,
    ) -> Result<TimetableType, TadoClientError> {
        let body = TimetableType {
            id: Some(timetable),
            r#type: None,
        };
        self.put_json(
            &format!("/homes/{}/zones/{}/schedule/activeTimetable", home_id.0, zone_id.0),
            &body,
        )
    }

    fn get_timetable_blocks(
        &self,
        home_id: HomeId,
        zone_id: ZoneId,
        timetable: TimetableTypeId,
    ) -> Result<Vec<TimetableBlock>, TadoClientError> {
        self.get_json(&format!(
            "/homes/{}/zones/{}/schedule/timetables/{}/blocks",
            home_id.0,
            zone_id.0,
            timetable.as_i32()
        ))
    }

    fn set_timetable_blocks(
        &self,
        home_id: HomeId,
        zone_id: ZoneId,
        timetable: TimetableTypeId,
        day_type: DayType,
        blocks: &[TimetableBlock],
    ) -> Result<(), TadoClientError> {
        let day = day_type_segment(day_type)?;
        self.put_json_discard(
            &format!(
                "/homes/{}/zones/{}/schedule/timetables/{}/blocks/{}",
                home_id.0,
                zone_id.0,
                timetable.as_i32(),
                day
            ),
            &blocks,
        )
    }

    fn drain_warnings(&self) -> Vec<String> {
        std::mem::take(&mut *self.warnings.borrow_mut())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn poll_errors_drive_the_device_flow() {
        assert!(matches!(
            classify_poll_error(400, r#"{"error":"authorization_pending"}"#),
            Ok(PollOutcome::Pending)
        ));
        assert!(matches!(
            classify_poll_error(400, r#"{"error":"slow_down"}"#),
            Ok(PollOutcome::SlowDown)
        ));
        match classify_poll_error(400, r#"{"error":"access_denied","error_description":"user said no"}"#) {
            Err(TadoClientError::Auth(msg)) => assert_eq!(msg, "access_denied: user said no"),
            other => panic!("unexpected outcome: {:?}", other.err()),
        }
        assert!(matches!(
            classify_poll_error(502, "<html>bad gateway</html>"),
            Err(TadoClientError::Http { status: 502, .. })
        ));
    }

    #[test]
    fn refresh_response_keeps_previous_refresh_token() {
        let body: TokenResponse =
            serde_json::from_str(r#"{"access_token":"new","token_type":"Bearer","expires_in":600}"#).unwrap();
        let before = Utc::now();
        let token = body.into_token(Some("old-refresh".to_string()));
        assert_eq!(token.access_token, "new");
        assert_eq!(token.refresh_token.as_deref(), Some("old-refresh"));
        assert!(token.expiry >= before + chrono::Duration::seconds(600));
    }

    #[test]
    fn device_authorization_defaults_interval() {
        let auth: DeviceAuthorization = serde_json::from_str(
            r#"{"device_code":"dc","user_code":"ABC123","verification_uri_complete":"https://login.tado.com/oauth2/device?user_code=ABC123","expires_in":300}"#,
        )
        .unwrap();
        assert_eq!(auth.interval, 5);
        assert_eq!(auth.user_code, "ABC123");
        assert!(auth.verification_uri.is_none());
    }

    #[test]
    fn day_type_path_segment() {
        assert_eq!(day_type_segment(DayType::MondayToFriday).unwrap(), "MONDAY_TO_FRIDAY");
        assert_eq!(day_type_segment(DayType::Sunday).unwrap(), "SUNDAY");
    }

    #[test]
    fn url_joins_paths() {
        assert_eq!(TadoClient::url("/me"), "https://my.tado.com/api/v2/me");
        assert_eq!(TadoClient::url("homes/1"), "https://my.tado.com/api/v2/homes/1");
    }
}
