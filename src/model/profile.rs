//! Profiles: named, ordered bundles of apps

use crate::error::{DartsHubError, Result};
use crate::model::argument::is_false;
use crate::model::configuration::RuntimeArguments;
use serde::{Deserialize, Serialize};

/// Per-profile association with one app
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileState {
    /// Name of the linked app
    pub app: String,
    /// The user cannot remove the app from auto-start
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_required: bool,
    /// Participates in profile runs
    #[serde(default, skip_serializing_if = "is_false")]
    pub tagged_for_start: bool,
    /// Values for the app's runtime arguments
    #[serde(default, skip_serializing_if = "RuntimeArguments::is_empty")]
    pub runtime_arguments: RuntimeArguments,
}

impl ProfileState {
    /// Untagged, optional entry
    pub fn new(app: impl Into<String>) -> Self {
        Self {
            app: app.into(),
            is_required: false,
            tagged_for_start: false,
            runtime_arguments: RuntimeArguments::new(),
        }
    }

    /// Required entry (always tagged)
    #[must_use]
    pub fn required(mut self) -> Self {
        self.is_required = true;
        self.tagged_for_start = true;
        self
    }

    /// Tagged for start
    #[must_use]
    pub fn tagged(mut self) -> Self {
        self.tagged_for_start = true;
        self
    }

    /// Add a runtime argument value
    #[must_use]
    pub fn with_runtime(mut self, name: &str, value: &str) -> Self {
        self.runtime_arguments
            .insert(name.to_string(), value.to_string());
        self
    }

    /// Whether a profile run starts this app
    pub fn is_startable(&self) -> bool {
        self.is_required || self.tagged_for_start
    }
}

/// Named bundle of apps
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    /// Profile name
    pub name: String,
    /// Entries in user order, unique by app name
    #[serde(default)]
    pub apps: Vec<ProfileState>,
}

impl Profile {
    /// Create an empty profile
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            apps: Vec::new(),
        }
    }

    /// Builder-style `add_app` for static defaults
    #[must_use]
    pub fn with(mut self, state: ProfileState) -> Self {
        self.add_app(state);
        self
    }

    /// Entry for `app`
    pub fn state(&self, app: &str) -> Option<&ProfileState> {
        self.apps.iter().find(|s| s.app == app)
    }

    /// Entry for `app`, mutable
    pub fn state_mut(&mut self, app: &str) -> Option<&mut ProfileState> {
        self.apps.iter_mut().find(|s| s.app == app)
    }

    /// Whether `app` is part of the profile
    pub fn contains(&self, app: &str) -> bool {
        self.state(app).is_some()
    }

    /// Append an entry; returns false if the app is already present
    pub fn add_app(&mut self, state: ProfileState) -> bool {
        if self.contains(&state.app) {
            return false;
        }
        self.apps.push(state);
        true
    }

    /// Insert an entry right after `anchor` (appended if the anchor is absent)
    pub fn insert_after(&mut self, anchor: &str, state: ProfileState) -> bool {
        if self.contains(&state.app) {
            return false;
        }
        match self.apps.iter().position(|s| s.app == anchor) {
            Some(i) => self.apps.insert(i + 1, state),
            None => self.apps.push(state),
        }
        true
    }

    /// Remove an entry; returns whether it existed
    pub fn remove_app(&mut self, app: &str) -> bool {
        let before = self.apps.len();
        self.apps.retain(|s| s.app != app);
        before != self.apps.len()
    }

    /// Change whether `app` starts with the profile
    ///
    /// Required entries cannot be untagged.
    pub fn set_tagged_for_start(&mut self, app: &str, tagged: bool) -> Result<()> {
        let profile = self.name.clone();
        let state = self
            .state_mut(app)
            .ok_or_else(|| DartsHubError::UnknownProfileApp {
                profile: profile.clone(),
                app: app.to_string(),
            })?;
        if state.is_required && !tagged {
            return Err(DartsHubError::RequiredApp {
                profile,
                app: app.to_string(),
            });
        }
        state.tagged_for_start = tagged;
        Ok(())
    }

    /// Entries a profile run starts, in order
    pub fn startable(&self) -> impl Iterator<Item = &ProfileState> {
        self.apps.iter().filter(|s| s.is_startable())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lidarts() -> Profile {
        Profile::new("lidarts")
            .with(ProfileState::new("darts-caller").required())
            .with(ProfileState::new("darts-extern").required().with_runtime("extern_platform", "lidarts"))
            .with(ProfileState::new("darts-wled"))
            .with(ProfileState::new("autodarts.io").tagged())
    }

    #[test]
    fn test_add_app_rejects_duplicates() {
        let mut profile = lidarts();
        assert!(!profile.add_app(ProfileState::new("darts-wled")));
        assert_eq!(profile.apps.len(), 4);
    }

    #[test]
    fn test_startable_keeps_order() {
        let profile = lidarts();
        let names: Vec<&str> = profile.startable().map(|s| s.app.as_str()).collect();
        assert_eq!(names, vec!["darts-caller", "darts-extern", "autodarts.io"]);
    }

    #[test]
    fn test_required_entry_cannot_be_untagged() {
        let mut profile = lidarts();
        let error = profile.set_tagged_for_start("darts-caller", false).unwrap_err();
        assert!(matches!(error, DartsHubError::RequiredApp { .. }));

        profile.set_tagged_for_start("darts-wled", true).unwrap();
        assert!(profile.state("darts-wled").unwrap().tagged_for_start);
        profile.set_tagged_for_start("darts-wled", false).unwrap();
        assert!(!profile.state("darts-wled").unwrap().tagged_for_start);
    }

    #[test]
    fn test_unknown_entry_names_profile_and_app() {
        let mut profile = lidarts();
        let error = profile.set_tagged_for_start("darts-ghost", true).unwrap_err();
        assert_eq!(
            error.to_string(),
            "Profile 'lidarts' references unknown app 'darts-ghost'"
        );
    }

    #[test]
    fn test_insert_after_anchor() {
        let mut profile = lidarts();
        assert!(profile.insert_after("darts-caller", ProfileState::new("darts-voice")));
        assert_eq!(profile.apps[1].app, "darts-voice");
        assert!(!profile.insert_after("darts-caller", ProfileState::new("darts-voice")));
        assert!(profile.remove_app("darts-voice"));
        assert!(!profile.remove_app("darts-voice"));
    }

    #[test]
    fn test_serialization_omits_defaults() {
        let json = serde_json::to_string(&ProfileState::new("darts-wled")).unwrap();
        assert_eq!(json, r#"{"app":"darts-wled"}"#);

        let state = ProfileState::new("darts-extern")
            .required()
            .with_runtime("extern_platform", "nakka");
        let json = serde_json::to_string(&state).unwrap();
        assert_eq!(
            json,
            r#"{"app":"darts-extern","isRequired":true,"taggedForStart":true,"runtimeArguments":{"extern_platform":"nakka"}}"#
        );
    }
}
