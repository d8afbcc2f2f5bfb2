use serde::{Deserialize, Serialize};

/// A latitude/longitude pair in the wire format the ordering service uses.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// Outcome of the OS-level location permission flow.
///
/// `Undetermined` means we have not yet asked; once the prompt has been
/// answered the state settles on `Granted` or `Denied` and is only ever
/// re-checked, never re-prompted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionState {
    Undetermined,
    Denied,
    Granted,
}

/// The last position obtained from the positioning subsystem.
///
/// Held in memory only - a fresh fix is acquired on every cold start.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocationFix {
    pub coords: Coordinates,
    pub permission: PermissionState,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coordinates_wire_format() {
        let json = r#"{"lat":45.47,"lng":9.18}"#;
        let coords: Coordinates = serde_json::from_str(json).unwrap();
        assert_eq!(coords, Coordinates::new(45.47, 9.18));
        assert_eq!(serde_json::to_string(&coords).unwrap(), json);
    }
}
