//! OAuth token persistence.
//!
//! The token file holds the JSON-encoded [`OAuthToken`]. It is written with
//! owner-only permissions on unix and truncated on every write.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OAuthToken {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    pub expiry: DateTime<Utc>,
}

impl OAuthToken {
    /// True when the access token expires within `margin` of `now`.
    pub fn expires_within(&self, now: DateTime<Utc>, margin: chrono::Duration) -> bool {
        now + margin >= self.expiry
    }
}

#[derive(Debug)]
pub enum TokenFileError {
    Io(io::Error),
    Json(serde_json::Error),
}

impl core::fmt::Display for TokenFileError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            TokenFileError::Io(e) => write!(f, "unable to access token file: {}", e),
            TokenFileError::Json(e) => write!(f, "unable to decode token: {}", e),
        }
    }
}

impl std::error::Error for TokenFileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TokenFileError::Io(e) => Some(e),
            TokenFileError::Json(e) => Some(e),
        }
    }
}

impl From<io::Error> for TokenFileError {
    fn from(value: io::Error) -> Self {
        TokenFileError::Io(value)
    }
}

impl From<serde_json::Error> for TokenFileError {
    fn from(value: serde_json::Error) -> Self {
        TokenFileError::Json(value)
    }
}

/// Read a token from `path`. A missing file is `Ok(None)`.
pub fn read_token(path: &Path) -> Result<Option<OAuthToken>, TokenFileError> {
    let raw = match fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let token = serde_json::from_str(&raw)?;
    Ok(Some(token))
}

/// Write `token` to `path`, creating or truncating the file.
pub fn write_token(token: &OAuthToken, path: &Path) -> Result<(), TokenFileError> {
    let bytes = serde_json::to_vec_pretty(token)?;

    let mut options = OpenOptions::new();
    options.create(true).write(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;
    file.write_all(&bytes)?;
    file.flush()?;
    Ok(())
}
