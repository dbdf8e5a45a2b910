//! Owner preferences loaded from a TOML file.
//!
//! ```toml
//! durations = "30,60"
//! timezone = "America/Chicago"
//!
//! [identity]
//! display_name = "Some Owner"
//! email = "owner@example.edu"
//! ```

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use availability_engine::{Identity, MeetingDurations};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
pub struct Preferences {
    pub identity: Option<Identity>,
    pub durations: Option<MeetingDurations>,
    /// Zone applied to recurring events that do not name one.
    pub timezone: Option<String>,
}

impl Preferences {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let prefs: Preferences = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        tracing::debug!(path = %path.display(), "loaded preferences");
        Ok(prefs)
    }

    pub fn load(path: Option<&str>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    /// The identity from `name`/`email` flags, falling back to the file.
    pub fn resolve_identity(&self, name: Option<&str>, email: Option<&str>) -> Result<Identity> {
        match (name, email, &self.identity) {
            (Some(name), Some(email), _) => Ok(Identity::new(name, email)),
            (None, None, Some(identity)) => Ok(identity.clone()),
            (name, email, Some(identity)) => Ok(Identity::new(
                name.unwrap_or(&identity.display_name),
                email.unwrap_or(&identity.email),
            )),
            _ => anyhow::bail!(
                "No identity given: pass --name and --email or set [identity] in --config"
            ),
        }
    }

    pub fn resolve_durations(&self, key: Option<&str>) -> Result<MeetingDurations> {
        match key {
            Some(key) => MeetingDurations::from_key(key)
                .with_context(|| format!("Invalid --durations value: {}", key)),
            None => Ok(self.durations.unwrap_or(MeetingDurations::THIRTY)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_full_preferences() {
        let text = r#"
durations = "30,60"
timezone = "America/Chicago"

[identity]
display_name = "Some Owner"
email = "owner@example.edu"
"#;
        let prefs: Preferences = toml::from_str(text).unwrap();
        assert_eq!(prefs.durations, Some(MeetingDurations::THIRTY_SIXTY));
        assert_eq!(prefs.timezone.as_deref(), Some("America/Chicago"));
        assert_eq!(
            prefs.resolve_identity(None, None).unwrap(),
            Identity::new("Some Owner", "owner@example.edu")
        );
    }

    #[test]
    fn flags_override_file() {
        let prefs: Preferences = toml::from_str(
            r#"
[identity]
display_name = "Some Owner"
email = "owner@example.edu"
"#,
        )
        .unwrap();
        let identity = prefs.resolve_identity(None, Some("other@example.edu")).unwrap();
        assert_eq!(identity, Identity::new("Some Owner", "other@example.edu"));
        assert_eq!(prefs.resolve_durations(Some("45")).unwrap(), MeetingDurations::FORTY_FIVE);
        assert_eq!(prefs.resolve_durations(None).unwrap(), MeetingDurations::THIRTY);
    }

    #[test]
    fn missing_identity_is_an_error() {
        assert!(Preferences::default().resolve_identity(Some("Only Name"), None).is_err());
    }

    #[test]
    fn bad_durations_fail_to_parse() {
        assert!(toml::from_str::<Preferences>(r#"durations = "sixty""#).is_err());
    }
}
