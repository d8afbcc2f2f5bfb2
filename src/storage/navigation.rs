//! Persisted "where was the user" marker and the routing table that
//! expands it into initial routes for the three navigation trees.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::models::Menu;

use super::StorageError;

const MARKER_FILE: &str = "last_screen.json";

/// The single resumability record: last visited screen plus the menu the
/// user was looking at, if any. Written on every relevant transition, read
/// once at bootstrap.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationMarker {
    pub screen: Option<String>,
    pub last_menu: Option<Menu>,
}

#[derive(Clone)]
pub struct NavigationStateStore {
    data_dir: PathBuf,
}

impl NavigationStateStore {
    pub fn new(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }

    /// Record the screen the user is on. The menu snapshot is replaced
    /// only when the caller has one; saving a screen without a menu keeps
    /// the previously recorded menu.
    pub fn save(&self, screen: &str, last_menu: Option<&Menu>) -> Result<(), StorageError> {
        let mut marker = self.load();
        marker.screen = Some(screen.to_string());
        if let Some(menu) = last_menu {
            marker.last_menu = Some(menu.clone());
        }
        super::write_json(&self.path(), &marker)
    }

    /// Load the marker; absent or unreadable records come back empty.
    pub fn load(&self) -> NavigationMarker {
        match super::read_json(&self.path()) {
            Ok(marker) => marker.unwrap_or_default(),
            Err(e) => {
                warn!(error = %e, "navigation marker read failed, starting from default");
                NavigationMarker::default()
            }
        }
    }

    /// Remove the marker. Idempotent.
    pub fn clear(&self) -> Result<(), StorageError> {
        super::remove_if_exists(&self.path())
    }

    fn path(&self) -> PathBuf {
        self.data_dir.join(MARKER_FILE)
    }
}

/// Initial routes for the tab root navigator and its two nested stacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InitialRoutes {
    pub root_tab: &'static str,
    pub home_initial: &'static str,
    pub profile_initial: &'static str,
}

const DEFAULT_ROUTES: InitialRoutes = InitialRoutes {
    root_tab: "Home",
    home_initial: "Homepage",
    profile_initial: "ProfilePage",
};

/// Expand a persisted screen name into initial routes.
///
/// Total over every input: the seven known screens map to their resume
/// position, anything else (unknown name, empty string, no marker at all)
/// lands on the same default as the application's true default screen.
pub fn initial_routes(last_screen: Option<&str>) -> InitialRoutes {
    match last_screen {
        Some("Menu") => InitialRoutes {
            root_tab: "Home",
            home_initial: "Menu",
            profile_initial: "ProfilePage",
        },
        Some("ConfirmOrder") => InitialRoutes {
            root_tab: "Home",
            home_initial: "ConfirmOrder",
            profile_initial: "ProfilePage",
        },
        Some("Homepage") => DEFAULT_ROUTES,
        Some("Ingredients") => InitialRoutes {
            root_tab: "Home",
            home_initial: "Ingredients",
            profile_initial: "ProfilePage",
        },
        Some("ProfilePage") => InitialRoutes {
            root_tab: "Profile",
            home_initial: "Homepage",
            profile_initial: "ProfilePage",
        },
        Some("Form") => InitialRoutes {
            root_tab: "Profile",
            home_initial: "Homepage",
            profile_initial: "Form",
        },
        Some("Order") => InitialRoutes {
            root_tab: "Order",
            home_initial: "Homepage",
            profile_initial: "ProfilePage",
        },
        _ => DEFAULT_ROUTES,
    }
}
