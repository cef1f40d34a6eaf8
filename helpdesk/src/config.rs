//! Client configuration loaded via OrthoConfig.
//!
//! Every field can be set through a `HELPDESK_*` environment variable.

use std::time::Duration;

use chrono::FixedOffset;
use ortho_config::OrthoConfig;
use serde::Deserialize;
use url::Url;

use pagination::PageRequest;

/// Problems turning raw settings into typed values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettingsError {
    #[error("{name} is not configured")]
    Missing { name: &'static str },
    #[error("{name} is not a valid URL: {message}")]
    InvalidUrl { name: &'static str, message: String },
    #[error("{name} must be greater than zero")]
    Zero { name: &'static str },
    #[error("page size {size} is out of range")]
    PageSize { size: u32 },
    #[error("UTC offset of {minutes} minutes is out of range")]
    Offset { minutes: i32 },
}

/// Connection and presentation settings for the helpdesk client.
#[derive(Debug, Clone, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "HELPDESK")]
pub struct HelpdeskSettings {
    /// Project URL of the managed backend.
    pub backend_url: Option<String>,
    /// Public (anonymous) API key of the project.
    pub anon_key: Option<String>,
    /// Websocket endpoint override for realtime changes.
    pub realtime_url: Option<String>,
    /// Tickets per page in listings.
    #[ortho_config(default = 10)]
    pub page_size: u32,
    #[ortho_config(default = 30)]
    pub request_timeout_secs: u64,
    /// Seconds between realtime heartbeats.
    #[ortho_config(default = 25)]
    pub heartbeat_secs: u64,
    /// Local offset used for day boundaries in dashboards and reports.
    #[ortho_config(default = 0)]
    pub utc_offset_minutes: i32,
}

fn parse_url(name: &'static str, raw: &str) -> Result<Url, SettingsError> {
    Url::parse(raw).map_err(|err| SettingsError::InvalidUrl {
        name,
        message: err.to_string(),
    })
}

fn positive_secs(name: &'static str, secs: u64) -> Result<Duration, SettingsError> {
    if secs == 0 {
        return Err(SettingsError::Zero { name });
    }
    Ok(Duration::from_secs(secs))
}

impl HelpdeskSettings {
    /// Parsed backend base URL.
    pub fn backend_url(&self) -> Result<Url, SettingsError> {
        let raw = self
            .backend_url
            .as_deref()
            .ok_or(SettingsError::Missing { name: "backend_url" })?;
        parse_url("backend_url", raw)
    }

    /// Public API key sent with every request.
    pub fn anon_key(&self) -> Result<&str, SettingsError> {
        self.anon_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or(SettingsError::Missing { name: "anon_key" })
    }

    /// Realtime socket URL, when one is configured.
    pub fn realtime_url(&self) -> Result<Option<Url>, SettingsError> {
        self.realtime_url
            .as_deref()
            .map(|raw| parse_url("realtime_url", raw))
            .transpose()
    }

    /// First page at the configured size.
    pub fn first_page(&self) -> Result<PageRequest, SettingsError> {
        PageRequest::first(self.page_size).map_err(|_| SettingsError::PageSize {
            size: self.page_size,
        })
    }

    /// Per-request HTTP timeout.
    pub fn request_timeout(&self) -> Result<Duration, SettingsError> {
        positive_secs("request_timeout_secs", self.request_timeout_secs)
    }

    /// Interval between realtime heartbeats.
    pub fn heartbeat(&self) -> Result<Duration, SettingsError> {
        positive_secs("heartbeat_secs", self.heartbeat_secs)
    }

    /// Offset used to display and bucket local dates.
    pub fn utc_offset(&self) -> Result<FixedOffset, SettingsError> {
        self.utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or(SettingsError::Offset {
                minutes: self.utc_offset_minutes,
            })
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for client configuration parsing.

    use super::*;
    use std::ffi::OsString;

    use env_lock::lock_env;
    use rstest::rstest;

    const KEYS: [&str; 7] = [
        "HELPDESK_BACKEND_URL",
        "HELPDESK_ANON_KEY",
        "HELPDESK_REALTIME_URL",
        "HELPDESK_PAGE_SIZE",
        "HELPDESK_REQUEST_TIMEOUT_SECS",
        "HELPDESK_HEARTBEAT_SECS",
        "HELPDESK_UTC_OFFSET_MINUTES",
    ];

    fn load_from_empty_args() -> HelpdeskSettings {
        HelpdeskSettings::load_from_iter([OsString::from("helpdesk")])
            .expect("config should load")
    }

    #[rstest]
    fn default_values_are_used_when_missing() {
        let _guard = lock_env(KEYS.map(|key| (key, None::<String>)));

        let settings = load_from_empty_args();
        assert_eq!(
            settings.backend_url(),
            Err(SettingsError::Missing { name: "backend_url" })
        );
        assert!(settings.anon_key().is_err());
        assert_eq!(settings.realtime_url(), Ok(None));
        assert_eq!(settings.first_page().map(|page| page.size()), Ok(10));
        assert_eq!(settings.request_timeout(), Ok(Duration::from_secs(30)));
        assert_eq!(settings.heartbeat(), Ok(Duration::from_secs(25)));
        assert_eq!(
            settings.utc_offset().map(|offset| offset.local_minus_utc()),
            Ok(0)
        );
    }

    #[rstest]
    fn environment_overrides_are_respected() {
        let _guard = lock_env([
            ("HELPDESK_BACKEND_URL", Some("https://desk.example.co".to_owned())),
            ("HELPDESK_ANON_KEY", Some("public-key".to_owned())),
            ("HELPDESK_REALTIME_URL", None),
            ("HELPDESK_PAGE_SIZE", Some("25".to_owned())),
            ("HELPDESK_REQUEST_TIMEOUT_SECS", None),
            ("HELPDESK_HEARTBEAT_SECS", Some("10".to_owned())),
            ("HELPDESK_UTC_OFFSET_MINUTES", Some("-180".to_owned())),
        ]);

        let settings = load_from_empty_args();
        assert_eq!(
            settings.backend_url().map(String::from),
            Ok("https://desk.example.co/".to_owned())
        );
        assert_eq!(settings.anon_key(), Ok("public-key"));
        assert_eq!(settings.first_page().map(|page| page.size()), Ok(25));
        assert_eq!(settings.heartbeat(), Ok(Duration::from_secs(10)));
        assert_eq!(
            settings.utc_offset().map(|offset| offset.local_minus_utc()),
            Ok(-3 * 3600)
        );
    }

    #[rstest]
    #[case(0, 30)]
    #[case(10, 0)]
    fn zero_durations_are_rejected(#[case] timeout: u64, #[case] heartbeat: u64) {
        let settings = HelpdeskSettings {
            backend_url: None,
            anon_key: None,
            realtime_url: None,
            page_size: 10,
            request_timeout_secs: timeout,
            heartbeat_secs: heartbeat,
            utc_offset_minutes: 0,
        };
        assert!(settings.request_timeout().is_err() || settings.heartbeat().is_err());
    }

    #[rstest]
    fn malformed_urls_are_reported_by_name() {
        let settings = HelpdeskSettings {
            backend_url: Some("not a url".to_owned()),
            anon_key: Some("k".to_owned()),
            realtime_url: None,
            page_size: 10,
            request_timeout_secs: 30,
            heartbeat_secs: 25,
            utc_offset_minutes: 0,
        };
        assert!(matches!(
            settings.backend_url(),
            Err(SettingsError::InvalidUrl { name: "backend_url", .. })
        ));
    }
}
