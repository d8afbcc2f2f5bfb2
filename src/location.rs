//! Location permission state machine and last-known-fix tracking.
//!
//! The OS positioning subsystem sits behind the [`PositionBackend`] trait;
//! the provider owns the permission flow on top of it. The prompt is shown
//! at most once per process: after the user answers, the provider only
//! ever re-checks the OS-level grant, it never re-prompts.

use std::future::Future;

use thiserror::Error;
use tracing::debug;

use crate::models::{Coordinates, LocationFix, PermissionState};

#[derive(Debug, Error)]
pub enum LocationError {
    /// The user refused the permission prompt. Degrades the UI, not fatal.
    #[error("location permission denied")]
    PermissionDenied,

    /// A fix was requested before the permission flow ran. This is a
    /// programmer error class: it cannot occur when `ensure_permission`
    /// is called first.
    #[error("location fix requested before permission was granted")]
    Unavailable,

    #[error("positioning backend error: {0}")]
    Backend(String),
}

/// OS positioning subsystem interface.
pub trait PositionBackend: Send {
    /// Whether the OS currently reports the permission as granted.
    fn check_permission(&self) -> impl Future<Output = bool> + Send;

    /// Show the permission prompt and report the user's answer.
    fn request_permission(&mut self) -> impl Future<Output = bool> + Send;

    /// Query the current position. Only called while granted.
    fn current_position(&self) -> impl Future<Output = Result<Coordinates, LocationError>> + Send;

    /// Resolve a coordinate to a human-readable address, when the platform
    /// supports it.
    fn reverse_geocode(
        &self,
        coords: Coordinates,
    ) -> impl Future<Output = Result<Option<String>, LocationError>> + Send {
        let _ = coords;
        std::future::ready(Ok(None))
    }
}

pub struct LocationProvider<B> {
    backend: B,
    permission: PermissionState,
    last_fix: Option<LocationFix>,
}

impl<B: PositionBackend> LocationProvider<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            permission: PermissionState::Undetermined,
            last_fix: None,
        }
    }

    /// Settle the permission state, prompting at most once.
    ///
    /// From `Undetermined` the OS grant is checked and, if absent, the
    /// prompt is shown exactly once. From `Denied` only the grant is
    /// re-checked (the user may have granted it from system settings);
    /// there is no automatic re-prompt.
    pub async fn ensure_permission(&mut self) -> PermissionState {
        match self.permission {
            PermissionState::Granted => {}
            PermissionState::Denied => {
                if self.backend.check_permission().await {
                    self.permission = PermissionState::Granted;
                }
            }
            PermissionState::Undetermined => {
                if self.backend.check_permission().await {
                    self.permission = PermissionState::Granted;
                } else {
                    debug!("requesting location permission");
                    self.permission = if self.backend.request_permission().await {
                        PermissionState::Granted
                    } else {
                        PermissionState::Denied
                    };
                }
            }
        }
        self.permission
    }

    /// Acquire a fresh fix. Always queries the backend; the result is also
    /// retained for synchronous reads via [`last_fix`](Self::last_fix).
    pub async fn get_fix(&mut self) -> Result<LocationFix, LocationError> {
        match self.permission {
            PermissionState::Granted => {
                let coords = self.backend.current_position().await?;
                let fix = LocationFix {
                    coords,
                    permission: PermissionState::Granted,
                };
                self.last_fix = Some(fix);
                Ok(fix)
            }
            PermissionState::Denied => Err(LocationError::PermissionDenied),
            PermissionState::Undetermined => Err(LocationError::Unavailable),
        }
    }

    /// The most recent fix, without touching the backend.
    pub fn last_fix(&self) -> Option<LocationFix> {
        self.last_fix
    }

    pub fn permission(&self) -> PermissionState {
        self.permission
    }

    /// Resolve the last fix to an address, when the backend supports it.
    pub async fn address(&self) -> Result<Option<String>, LocationError> {
        match self.last_fix {
            Some(fix) => self.backend.reverse_geocode(fix.coords).await,
            None => Err(LocationError::Unavailable),
        }
    }
}

/// Backend that always reports one configured position. Useful for
/// desktop builds without a positioning subsystem and for tests.
pub struct FixedPosition {
    pub coords: Coordinates,
    pub granted: bool,
}

impl PositionBackend for FixedPosition {
    fn check_permission(&self) -> impl Future<Output = bool> + Send {
        std::future::ready(self.granted)
    }

    fn request_permission(&mut self) -> impl Future<Output = bool> + Send {
        std::future::ready(self.granted)
    }

    fn current_position(&self) -> impl Future<Output = Result<Coordinates, LocationError>> + Send {
        std::future::ready(Ok(self.coords))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct PromptingBackend {
        granted_in_os: bool,
        answer: bool,
        prompts: usize,
    }

    impl PositionBackend for PromptingBackend {
        async fn check_permission(&self) -> bool {
            self.granted_in_os
        }

        async fn request_permission(&mut self) -> bool {
            self.prompts += 1;
            self.answer
        }

        async fn current_position(&self) -> Result<Coordinates, LocationError> {
            Ok(Coordinates::new(45.47, 9.18))
        }
    }

    #[tokio::test]
    async fn prompt_is_shown_at_most_once() {
        let mut provider = LocationProvider::new(PromptingBackend {
            granted_in_os: false,
            answer: false,
            prompts: 0,
        });

        assert_eq!(provider.ensure_permission().await, PermissionState::Denied);
        assert_eq!(provider.ensure_permission().await, PermissionState::Denied);
        assert_eq!(provider.backend.prompts, 1);
    }

    #[tokio::test]
    async fn os_grant_skips_the_prompt() {
        let mut provider = LocationProvider::new(PromptingBackend {
            granted_in_os: true,
            answer: false,
            prompts: 0,
        });

        assert_eq!(provider.ensure_permission().await, PermissionState::Granted);
        assert_eq!(provider.backend.prompts, 0);
    }

    #[tokio::test]
    async fn denied_state_recovers_after_settings_change() {
        let mut provider = LocationProvider::new(PromptingBackend {
            granted_in_os: false,
            answer: false,
            prompts: 0,
        });
        assert_eq!(provider.ensure_permission().await, PermissionState::Denied);

        // User flips the toggle in system settings.
        provider.backend.granted_in_os = true;
        assert_eq!(provider.ensure_permission().await, PermissionState::Granted);
        assert_eq!(provider.backend.prompts, 1);
    }

    #[tokio::test]
    async fn fix_requires_settled_permission() {
        let mut provider = LocationProvider::new(FixedPosition {
            coords: Coordinates::new(1.0, 2.0),
            granted: true,
        });

        assert!(matches!(
            provider.get_fix().await,
            Err(LocationError::Unavailable)
        ));

        provider.ensure_permission().await;
        let fix = provider.get_fix().await.unwrap();
        assert_eq!(fix.coords, Coordinates::new(1.0, 2.0));
        assert_eq!(provider.last_fix(), Some(fix));
    }

    struct GeocodingBackend;

    impl PositionBackend for GeocodingBackend {
        async fn check_permission(&self) -> bool {
            true
        }

        async fn request_permission(&mut self) -> bool {
            true
        }

        async fn current_position(&self) -> Result<Coordinates, LocationError> {
            Ok(Coordinates::new(45.47, 9.18))
        }

        async fn reverse_geocode(
            &self,
            coords: Coordinates,
        ) -> Result<Option<String>, LocationError> {
            Ok(Some(format!("Via Festa del Perdono ({})", coords.lat)))
        }
    }

    #[tokio::test]
    async fn address_resolves_the_last_fix_through_the_backend() {
        let mut provider = LocationProvider::new(GeocodingBackend);

        // No fix yet, nothing to resolve.
        assert!(matches!(
            provider.address().await,
            Err(LocationError::Unavailable)
        ));

        provider.ensure_permission().await;
        provider.get_fix().await.unwrap();
        let address = provider.address().await.unwrap();
        assert_eq!(address.as_deref(), Some("Via Festa del Perdono (45.47)"));
    }

    #[tokio::test]
    async fn address_is_none_without_geocoding_support() {
        let mut provider = LocationProvider::new(FixedPosition {
            coords: Coordinates::new(1.0, 2.0),
            granted: true,
        });
        provider.ensure_permission().await;
        provider.get_fix().await.unwrap();
        assert_eq!(provider.address().await.unwrap(), None);
    }

    #[tokio::test]
    async fn fix_after_denial_is_a_permission_error() {
        let mut provider = LocationProvider::new(FixedPosition {
            coords: Coordinates::new(1.0, 2.0),
            granted: false,
        });
        provider.ensure_permission().await;
        assert!(matches!(
            provider.get_fix().await,
            Err(LocationError::PermissionDenied)
        ));
    }
}
