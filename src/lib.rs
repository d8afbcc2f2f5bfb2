//! SkyDeli sync core.
//!
//! Local synchronization and caching layer for a thin client over the
//! SkyDeli drone-delivery ordering service. The crate owns everything
//! between the UI and the network: the durable session record, the
//! versioned menu-image cache, the navigation marker used to resume where
//! the user left off, the location permission flow, and the polling
//! tracker for an order on delivery.
//!
//! [`sync::SyncEngine`] is the entry point; it composes the stores, the
//! API client and the location provider, and every other module is
//! reachable through it.

pub mod api;
pub mod config;
pub mod location;
pub mod models;
pub mod storage;
pub mod sync;
pub mod tracker;
pub mod utils;

pub use api::{ApiClient, ApiError, OrderingApi};
pub use config::Config;
pub use location::{FixedPosition, LocationError, LocationProvider, PositionBackend};
pub use models::{
    Coordinates, Ingredient, LocationFix, Menu, MenuDetails, MenuImage, NewUser, Order,
    OrderStatus, PermissionState, ProfileUpdate, UserProfile, UserSession,
};
pub use storage::{
    initial_routes, CachedImage, ImageCache, InitialRoutes, NavigationMarker,
    NavigationStateStore, SessionStore, StorageError,
};
pub use sync::{Bootstrap, SessionContext, Snapshot, SyncEngine, Tracking};
pub use tracker::{ApiOrderSource, OrderSource, OrderTracker, TrackerEvent};
