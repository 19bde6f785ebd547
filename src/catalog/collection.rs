//! In-memory catalog: every loaded app plus the profiles

use crate::error::{DartsHubError, Result};
use crate::model::{App, AppKind, Configuration, DownloadableApp, Profile};

/// Apps of all four catalog files and the profiles
///
/// Apps keep their file order; saving filters them back per kind.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    /// Apps in load order
    pub apps: Vec<App>,
    /// Profiles in user order
    pub profiles: Vec<Profile>,
}

impl Catalog {
    /// App by name
    pub fn app(&self, name: &str) -> Option<&App> {
        self.apps.iter().find(|a| a.name() == name)
    }

    /// App by name, mutable
    pub fn app_mut(&mut self, name: &str) -> Option<&mut App> {
        self.apps.iter_mut().find(|a| a.name() == name)
    }

    /// Whether an app with this name is loaded
    pub fn has_app(&self, name: &str) -> bool {
        self.app(name).is_some()
    }

    /// Apps belonging to one catalog file
    pub fn apps_of(&self, kind: AppKind) -> impl Iterator<Item = &App> {
        self.apps.iter().filter(move |a| a.kind() == kind)
    }

    /// Downloadable app by name, mutable
    pub fn downloadable_mut(&mut self, name: &str) -> Option<&mut DownloadableApp> {
        match self.app_mut(name)? {
            App::Downloadable(app) => Some(app),
            _ => None,
        }
    }

    /// Configuration of an app, mutable
    pub fn configuration_mut(&mut self, app: &str) -> Option<&mut Configuration> {
        self.app_mut(app)?.base_mut().configuration.as_mut()
    }

    /// Profile by name
    pub fn profile(&self, name: &str) -> Option<&Profile> {
        self.profiles.iter().find(|p| p.name == name)
    }

    /// Profile by name, mutable
    pub fn profile_mut(&mut self, name: &str) -> Option<&mut Profile> {
        self.profiles.iter_mut().find(|p| p.name == name)
    }

    /// Rename an app and every profile entry pointing at it
    ///
    /// Returns false if `old` is absent or `new` is already taken.
    pub fn rename_app(&mut self, old: &str, new: &str) -> bool {
        if self.has_app(new) {
            return false;
        }
        let Some(app) = self.app_mut(old) else {
            return false;
        };
        app.base_mut().name = new.to_string();
        for profile in &mut self.profiles {
            if let Some(state) = profile.state_mut(old) {
                state.app = new.to_string();
            }
        }
        true
    }

    /// Check that every profile entry resolves to a loaded app
    pub fn validate_links(&self) -> Result<()> {
        for profile in &self.profiles {
            for state in &profile.apps {
                if !self.has_app(&state.app) {
                    return Err(DartsHubError::UnknownProfileApp {
                        profile: profile.name.clone(),
                        app: state.app.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AppBase, OpenApp, ProfileState};

    fn open(name: &str) -> App {
        App::from(OpenApp {
            base: AppBase::new(name),
            default_value: "https://play.autodarts.io".to_string(),
        })
    }

    fn catalog() -> Catalog {
        Catalog {
            apps: vec![open("autodarts.io"), open("autodarts-gif")],
            profiles: vec![
                Profile::new("custom")
                    .with(ProfileState::new("autodarts.io").tagged())
                    .with(ProfileState::new("autodarts-gif")),
            ],
        }
    }

    #[test]
    fn test_rename_updates_profiles() {
        let mut catalog = catalog();
        assert!(catalog.rename_app("autodarts-gif", "darts-gif"));
        assert!(catalog.has_app("darts-gif"));
        assert!(!catalog.has_app("autodarts-gif"));
        assert!(catalog.profile("custom").unwrap().contains("darts-gif"));
        assert!(catalog.validate_links().is_ok());

        assert!(!catalog.rename_app("autodarts-gif", "darts-gif"));
        assert!(!catalog.rename_app("darts-gif", "autodarts.io"));
    }

    #[test]
    fn test_dangling_link_names_profile_and_app() {
        let mut catalog = catalog();
        catalog
            .profile_mut("custom")
            .unwrap()
            .add_app(ProfileState::new("darts-ghost"));
        let error = catalog.validate_links().unwrap_err();
        assert!(matches!(
            error,
            DartsHubError::UnknownProfileApp { ref profile, ref app }
                if profile == "custom" && app == "darts-ghost"
        ));
    }

    #[test]
    fn test_apps_of_kind() {
        let catalog = catalog();
        assert_eq!(catalog.apps_of(AppKind::Open).count(), 2);
        assert_eq!(catalog.apps_of(AppKind::Local).count(), 0);
    }
}
