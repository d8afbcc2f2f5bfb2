//! Data models for the SkyDeli ordering domain.
//!
//! This module contains the data structures shared across the sync core:
//!
//! - `UserSession` and its partial server-response types
//! - `Menu`, `MenuDetails`, `Ingredient`, `MenuImage`
//! - `Order`, `OrderStatus`
//! - `Coordinates`, `PermissionState`, `LocationFix`

pub mod location;
pub mod menu;
pub mod order;
pub mod user;

pub use location::{Coordinates, LocationFix, PermissionState};
pub use menu::{Ingredient, Menu, MenuDetails, MenuImage};
pub use order::{Order, OrderStatus};
pub use user::{NewUser, ProfileUpdate, UserProfile, UserSession};
