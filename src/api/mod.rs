//! REST client for the SkyDeli ordering service.
//!
//! The service speaks JSON over HTTP and authenticates every request with
//! the session's secret `sid`, passed as a query or body parameter. The
//! [`OrderingApi`] trait is the seam the rest of the core programs against;
//! [`ApiClient`] is the production implementation.

use std::future::Future;

use anyhow::Result;

use crate::models::{
    Coordinates, Ingredient, Menu, MenuDetails, MenuImage, NewUser, Order, ProfileUpdate,
    UserProfile,
};

pub mod client;
pub mod error;

pub use client::ApiClient;
pub use error::ApiError;

/// Remote ordering service contract.
///
/// Methods return `Send` futures so implementations can be polled from
/// spawned tasks (the order tracker runs on its own task).
pub trait OrderingApi: Send + Sync {
    /// Register a new user; the server issues the `{uid, sid}` identity pair.
    fn create_user(&self) -> impl Future<Output = Result<NewUser>> + Send;

    /// Fetch the full user record.
    fn get_user(&self, uid: i64, sid: &str) -> impl Future<Output = Result<UserProfile>> + Send;

    /// Replace the user's profile and payment fields. Succeeds with no body.
    fn update_user(
        &self,
        uid: i64,
        sid: &str,
        update: &ProfileUpdate,
    ) -> impl Future<Output = Result<()>> + Send;

    /// List menus deliverable near a coordinate.
    fn list_menus(
        &self,
        sid: &str,
        near: Coordinates,
    ) -> impl Future<Output = Result<Vec<Menu>>> + Send;

    /// Fetch one menu's detail record (adds the long description the list
    /// endpoint omits).
    fn get_menu(
        &self,
        mid: i64,
        sid: &str,
        near: Coordinates,
    ) -> impl Future<Output = Result<MenuDetails>> + Send;

    /// Fetch the ingredient list for a menu item.
    fn get_ingredients(
        &self,
        mid: i64,
        sid: &str,
    ) -> impl Future<Output = Result<Vec<Ingredient>>> + Send;

    /// Fetch a menu item's image (base64 payload plus asset version).
    fn get_image(&self, mid: i64, sid: &str) -> impl Future<Output = Result<MenuImage>> + Send;

    /// Place an order for a menu item at a delivery coordinate.
    ///
    /// Fails with [`ApiError::ActiveOrderConflict`] while the user already
    /// has an order in flight, and [`ApiError::PaymentRejected`] when the
    /// card is refused.
    fn create_order(
        &self,
        mid: i64,
        sid: &str,
        delivery: Coordinates,
    ) -> impl Future<Output = Result<Order>> + Send;

    /// Fetch one order by id.
    fn get_order(&self, oid: i64, sid: &str) -> impl Future<Output = Result<Order>> + Send;
}
