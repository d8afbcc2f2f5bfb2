//! Process-wide orchestrator for the sync core.
//!
//! `SyncEngine` is the one API the UI layer talks to. It owns the durable
//! stores, the location provider and the shared [`SessionContext`], and
//! composes them into the application bootstrap sequence plus the mutation
//! operations (profile edit, order confirmation, account reset).
//!
//! The session record is mutated by several independent flows (profile
//! edits, order placement, the polling tracker), so every mutation goes
//! through the context's mutex: one writer at a time, enforced rather than
//! assumed.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as _, Result};
use futures::stream::{self, StreamExt};
use tokio::sync::{mpsc, Mutex};
use tracing::{info, warn};

use crate::api::OrderingApi;
use crate::config::Config;
use crate::location::{LocationProvider, PositionBackend};
use crate::models::{
    Coordinates, Ingredient, LocationFix, Menu, Order, ProfileUpdate, UserSession,
};
use crate::storage::{self, ImageCache, NavigationStateStore, SessionStore};
use crate::tracker::{ApiOrderSource, OrderTracker, TrackerEvent};

/// Maximum concurrent image fetches while hydrating a menu list.
/// Bounded to avoid overwhelming the server on a cold cache.
const MAX_CONCURRENT_IMAGE_FETCHES: usize = 8;

/// Shared mutable state owned by the composition root and passed by
/// reference to whoever needs it. The mutexes make the single-writer rule
/// for the session record explicit.
pub struct SessionContext {
    pub session: Mutex<Option<UserSession>>,
    pub last_menu: Mutex<Option<Menu>>,
}

impl SessionContext {
    pub fn new() -> Self {
        Self {
            session: Mutex::new(None),
            last_menu: Mutex::new(None),
        }
    }

    pub fn with_session(session: UserSession) -> Self {
        Self {
            session: Mutex::new(Some(session)),
            last_menu: Mutex::new(None),
        }
    }
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of the startup sequence.
#[derive(Debug)]
pub enum Bootstrap {
    /// No session identifier on disk: the UI should run onboarding, then
    /// call [`SyncEngine::register`].
    FirstRun,
    /// State restored from the device.
    Restored(Snapshot),
}

/// Composed state published at the end of bootstrap.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub session: UserSession,
    pub last_screen: Option<String>,
    /// Absent when the location permission is not granted; the UI degrades
    /// to its permission-prompt path.
    pub location: Option<LocationFix>,
}

/// What tracking found for the session's last order.
pub enum Tracking {
    /// The user never placed an order.
    NoOrder,
    /// The last order already reached its destination; nothing to poll.
    Delivered(Order),
    /// The order is on delivery and the polling task is running.
    Active(OrderTracker),
}

pub struct SyncEngine<A, B>
where
    A: OrderingApi + 'static,
    B: PositionBackend,
{
    api: Arc<A>,
    sessions: SessionStore,
    images: ImageCache,
    navigation: NavigationStateStore,
    ctx: Arc<SessionContext>,
    location: Mutex<LocationProvider<B>>,
    poll_interval: Duration,
}

impl<A, B> SyncEngine<A, B>
where
    A: OrderingApi + 'static,
    B: PositionBackend,
{
    /// Open the durable stores and assemble the engine. No network traffic
    /// happens here.
    pub fn new(config: &Config, api: A, backend: B) -> Result<Self> {
        let data_dir = config.data_dir()?;
        storage::open_data_dir(&data_dir)?;

        Ok(Self {
            api: Arc::new(api),
            sessions: SessionStore::new(data_dir.clone()),
            images: ImageCache::new(data_dir.clone()),
            navigation: NavigationStateStore::new(data_dir),
            ctx: Arc::new(SessionContext::new()),
            location: Mutex::new(LocationProvider::new(backend)),
            poll_interval: config.poll_interval(),
        })
    }

    /// Run the startup sequence: first-run check, session and navigation
    /// restore, opportunistic location fix, snapshot.
    ///
    /// A missing location fix never aborts bootstrap; it shows up as
    /// `location: None` in the snapshot.
    pub async fn bootstrap(&self) -> Result<Bootstrap> {
        let Some(session) = self.sessions.load() else {
            info!("no persisted session, reporting first run");
            return Ok(Bootstrap::FirstRun);
        };

        let marker = self.navigation.load();
        *self.ctx.session.lock().await = Some(session.clone());
        *self.ctx.last_menu.lock().await = marker.last_menu;

        let location = {
            let mut provider = self.location.lock().await;
            provider.ensure_permission().await;
            match provider.get_fix().await {
                Ok(fix) => Some(fix),
                Err(e) => {
                    warn!(error = %e, "no location fix at bootstrap");
                    None
                }
            }
        };

        info!(uid = session.uid, last_screen = ?marker.screen, "bootstrap complete");
        Ok(Bootstrap::Restored(Snapshot {
            session,
            last_screen: marker.screen,
            location,
        }))
    }

    /// First-run onboarding: register with the remote service and persist
    /// the issued identity.
    pub async fn register(&self) -> Result<UserSession> {
        let new_user = self.api.create_user().await.context("registration failed")?;
        let mut session = UserSession::new(new_user.uid, new_user.sid);

        // Enrich with whatever the server already knows about the account.
        match self.api.get_user(session.uid, &session.sid).await {
            Ok(profile) => session.merge_profile(&profile),
            Err(e) => warn!(error = %e, "profile fetch after registration failed"),
        }

        if let Err(e) = self.sessions.save(&session) {
            warn!(error = %e, "could not persist fresh session");
        }
        *self.ctx.session.lock().await = Some(session.clone());
        info!(uid = session.uid, "registered new session");
        Ok(session)
    }

    /// Push a profile edit to the server, then fold it into the persisted
    /// session.
    pub async fn update_profile(&self, update: ProfileUpdate) -> Result<UserSession> {
        let mut guard = self.ctx.session.lock().await;
        let session = guard
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("no active session"))?;

        self.api
            .update_user(session.uid, &session.sid, &update)
            .await?;
        session.apply_update(&update);
        self.sessions.save(session)?;
        Ok(session.clone())
    }

    /// Place an order and record it on the session.
    ///
    /// While an order is already in flight the server answers 409, which
    /// surfaces as [`crate::api::ApiError::ActiveOrderConflict`].
    pub async fn confirm_order(&self, mid: i64, delivery: Coordinates) -> Result<Order> {
        let mut guard = self.ctx.session.lock().await;
        let session = guard
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("no active session"))?;

        let order = self.api.create_order(mid, &session.sid, delivery).await?;
        session.record_order(order.oid, order.status);
        self.sessions.save(session)?;
        info!(oid = order.oid, mid, "order placed");
        Ok(order)
    }

    /// List menus deliverable near a coordinate, images hydrated through
    /// the cache with bounded concurrency.
    ///
    /// A menu whose image cannot be fetched is returned without one; a
    /// missing picture is not worth failing the whole listing for.
    pub async fn menus_near(&self, near: Coordinates) -> Result<Vec<Menu>> {
        let sid = self.sid().await?;
        let menus = self.api.list_menus(&sid, near).await?;

        let hydrated = stream::iter(
            menus
                .into_iter()
                .map(|menu| self.hydrate_image(menu, &sid)),
        )
        .buffered(MAX_CONCURRENT_IMAGE_FETCHES)
        .collect::<Vec<_>>()
        .await;

        Ok(hydrated)
    }

    async fn hydrate_image(&self, mut menu: Menu, sid: &str) -> Menu {
        let api = &self.api;
        let mid = menu.mid;
        let fetched = self
            .images
            .get(mid, menu.image_version, || async move {
                let image = api.get_image(mid, sid).await?;
                Ok(image.base64)
            })
            .await;

        match fetched {
            Ok(blob) => menu.image = Some(format!("data:image/png;base64,{blob}")),
            Err(e) => warn!(mid, error = %e, "menu image unavailable"),
        }
        menu
    }

    /// Fetch a menu's detail record and fold it into the listing entry.
    /// The merged menu becomes the context's last-menu snapshot.
    pub async fn menu_detail(&self, menu: &Menu, near: Coordinates) -> Result<Menu> {
        let sid = self.sid().await?;
        let details = self.api.get_menu(menu.mid, &sid, near).await?;

        let mut merged = menu.clone();
        merged.merge_detail(&details);
        *self.ctx.last_menu.lock().await = Some(merged.clone());
        Ok(merged)
    }

    pub async fn ingredients(&self, mid: i64) -> Result<Vec<Ingredient>> {
        let sid = self.sid().await?;
        self.api.get_ingredients(mid, &sid).await
    }

    /// Record the screen the user is on for resumability, keeping the
    /// session record durable alongside it.
    pub async fn save_screen(&self, screen: &str) -> Result<()> {
        if let Some(session) = self.ctx.session.lock().await.as_ref() {
            self.sessions.save(session)?;
        }
        let menu = self.ctx.last_menu.lock().await.clone();
        self.navigation.save(screen, menu.as_ref())?;
        Ok(())
    }

    /// Check the session's last order and, when it is on delivery, start
    /// the polling tracker. The tracker belongs to the caller (typically
    /// the order screen), which must `stop` it on teardown.
    pub async fn start_tracking(&self, events: mpsc::Sender<TrackerEvent>) -> Result<Tracking> {
        let (oid, sid) = {
            let guard = self.ctx.session.lock().await;
            let session = guard
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("no active session"))?;
            match session.last_order_id {
                Some(oid) => (oid, session.sid.clone()),
                None => return Ok(Tracking::NoOrder),
            }
        };

        let order = self.api.get_order(oid, &sid).await?;
        {
            let mut guard = self.ctx.session.lock().await;
            if let Some(session) = guard.as_mut() {
                session.record_order(order.oid, order.status);
                self.sessions.save(session)?;
            }
        }

        if order.is_on_delivery() {
            Ok(Tracking::Active(OrderTracker::spawn(
                Arc::new(ApiOrderSource::new(self.api.clone())),
                self.sessions.clone(),
                self.ctx.clone(),
                order,
                self.poll_interval,
                events,
            )))
        } else {
            Ok(Tracking::Delivered(order))
        }
    }

    /// Acquire a fresh location fix, running the permission flow first.
    pub async fn location_fix(&self) -> Result<LocationFix> {
        let mut provider = self.location.lock().await;
        provider.ensure_permission().await;
        Ok(provider.get_fix().await?)
    }

    /// Clear every store and the in-memory context. Used for account
    /// reset/sign-out; calling it twice is the same as calling it once.
    pub async fn reset_all(&self) -> Result<()> {
        self.sessions.clear()?;
        self.images.clear()?;
        self.navigation.clear()?;
        *self.ctx.session.lock().await = None;
        *self.ctx.last_menu.lock().await = None;
        info!("all local state cleared");
        Ok(())
    }

    /// Current in-memory session, if bootstrap or registration has run.
    pub async fn session(&self) -> Option<UserSession> {
        self.ctx.session.lock().await.clone()
    }

    /// The menu the user was last looking at, if any.
    pub async fn last_menu(&self) -> Option<Menu> {
        self.ctx.last_menu.lock().await.clone()
    }

    /// Shared state handle for collaborators outside the engine.
    pub fn context(&self) -> Arc<SessionContext> {
        self.ctx.clone()
    }

    async fn sid(&self) -> Result<String> {
        self.ctx
            .session
            .lock()
            .await
            .as_ref()
            .map(|s| s.sid.clone())
            .ok_or_else(|| anyhow::anyhow!("no active session"))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    use chrono::Utc;

    use super::*;
    use crate::api::ApiError;
    use crate::location::FixedPosition;
    use crate::models::{
        MenuDetails, MenuImage, NewUser, OrderStatus, UserProfile,
    };

    /// In-memory ordering service: one user, one active order at a time.
    #[derive(Default)]
    struct FakeState {
        users_created: AtomicUsize,
        image_fetches: AtomicUsize,
        active_order: StdMutex<Option<Order>>,
        next_oid: AtomicUsize,
    }

    #[derive(Clone, Default)]
    struct FakeApi {
        state: Arc<FakeState>,
    }

    impl FakeApi {
        fn complete_active_order(&self) {
            let mut guard = self.state.active_order.lock().unwrap();
            if let Some(order) = guard.as_mut() {
                order.status = OrderStatus::Completed;
            }
        }
    }

    impl OrderingApi for FakeApi {
        async fn create_user(&self) -> Result<NewUser> {
            let n = self.state.users_created.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(NewUser {
                uid: n as i64,
                sid: format!("sid-{n}"),
            })
        }

        async fn get_user(&self, _uid: i64, _sid: &str) -> Result<UserProfile> {
            Ok(UserProfile {
                first_name: Some("Ada".into()),
                last_name: Some("Lovelace".into()),
                ..Default::default()
            })
        }

        async fn update_user(&self, _uid: i64, _sid: &str, _update: &ProfileUpdate) -> Result<()> {
            Ok(())
        }

        async fn list_menus(&self, _sid: &str, near: Coordinates) -> Result<Vec<Menu>> {
            Ok(vec![menu(1, 1, near), menu(2, 4, near)])
        }

        async fn get_menu(&self, _mid: i64, _sid: &str, _near: Coordinates) -> Result<MenuDetails> {
            Ok(MenuDetails {
                long_description: Some("Slow-fermented dough, stone oven".into()),
                ..Default::default()
            })
        }

        async fn get_ingredients(&self, _mid: i64, _sid: &str) -> Result<Vec<Ingredient>> {
            Ok(Vec::new())
        }

        async fn get_image(&self, mid: i64, _sid: &str) -> Result<MenuImage> {
            self.state.image_fetches.fetch_add(1, Ordering::SeqCst);
            Ok(MenuImage {
                base64: format!("blob-{mid}"),
                image_version: None,
            })
        }

        async fn create_order(
            &self,
            mid: i64,
            _sid: &str,
            delivery: Coordinates,
        ) -> Result<Order> {
            let mut guard = self.state.active_order.lock().unwrap();
            if guard.as_ref().is_some_and(|o| o.is_on_delivery()) {
                return Err(ApiError::ActiveOrderConflict.into());
            }
            let oid = (self.state.next_oid.fetch_add(1, Ordering::SeqCst) + 100) as i64;
            let order = Order {
                oid,
                mid,
                uid: Some(1),
                status: OrderStatus::OnDelivery,
                delivery_location: Some(delivery),
                current_position: Some(delivery),
                creation_timestamp: Some(Utc::now()),
                expected_delivery_timestamp: None,
                delivery_timestamp: None,
            };
            *guard = Some(order.clone());
            Ok(order)
        }

        async fn get_order(&self, oid: i64, _sid: &str) -> Result<Order> {
            self.state
                .active_order
                .lock()
                .unwrap()
                .clone()
                .filter(|o| o.oid == oid)
                .ok_or_else(|| anyhow::anyhow!("no such order"))
        }
    }

    fn menu(mid: i64, image_version: i64, near: Coordinates) -> Menu {
        Menu {
            mid,
            name: format!("Menu {mid}"),
            price: 10.0,
            location: Some(near),
            image_version,
            short_description: None,
            long_description: None,
            delivery_time: Some(25),
            image: None,
        }
    }

    fn test_config(dir: &tempfile::TempDir) -> Config {
        Config {
            base_url: "http://unused.invalid".into(),
            data_dir: Some(dir.path().to_path_buf()),
            poll_interval_secs: 5,
        }
    }

    fn make_engine(
        config: &Config,
        api: FakeApi,
    ) -> SyncEngine<FakeApi, FixedPosition> {
        SyncEngine::new(
            config,
            api,
            FixedPosition {
                coords: Coordinates::new(45.47, 9.18),
                granted: true,
            },
        )
        .unwrap()
    }

    #[tokio::test]
    async fn first_run_then_restored_across_restarts() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(&dir);

        let first = make_engine(&config, FakeApi::default());
        assert!(matches!(first.bootstrap().await.unwrap(), Bootstrap::FirstRun));

        let session = first.register().await.unwrap();
        assert!(session.uid > 0);
        assert_eq!(session.first_name.as_deref(), Some("Ada"));

        // A new engine over the same data dir simulates a process restart.
        let second = make_engine(&config, FakeApi::default());
        match second.bootstrap().await.unwrap() {
            Bootstrap::Restored(snapshot) => {
                assert_eq!(snapshot.session.uid, session.uid);
                assert_eq!(snapshot.session.sid, session.sid);
                assert!(snapshot.location.is_some());
            }
            Bootstrap::FirstRun => panic!("session should have been restored"),
        }
    }

    #[tokio::test]
    async fn bootstrap_survives_denied_location() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(&dir);

        let setup = make_engine(&config, FakeApi::default());
        setup.register().await.unwrap();

        let no_location = SyncEngine::new(
            &config,
            FakeApi::default(),
            FixedPosition {
                coords: Coordinates::new(0.0, 0.0),
                granted: false,
            },
        )
        .unwrap();
        match no_location.bootstrap().await.unwrap() {
            Bootstrap::Restored(snapshot) => assert!(snapshot.location.is_none()),
            Bootstrap::FirstRun => panic!("session should have been restored"),
        }
    }

    #[tokio::test]
    async fn second_order_surfaces_the_conflict() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(&dir);
        let api = FakeApi::default();
        let engine = make_engine(&config, api.clone());
        engine.register().await.unwrap();

        let delivery = Coordinates::new(45.0, 9.0);
        let order = engine.confirm_order(1, delivery).await.unwrap();
        assert_eq!(
            engine.session().await.unwrap().last_order_status,
            Some(OrderStatus::OnDelivery)
        );

        let err = engine.confirm_order(2, delivery).await.unwrap_err();
        assert!(
            matches!(
                err.downcast_ref::<ApiError>(),
                Some(ApiError::ActiveOrderConflict)
            ),
            "expected the distinguished conflict, got: {err:#}"
        );

        // The session still points at the original order.
        assert_eq!(
            engine.session().await.unwrap().last_order_id,
            Some(order.oid)
        );
    }

    #[tokio::test]
    async fn menu_images_come_from_the_cache_on_repeat_listings() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(&dir);
        let api = FakeApi::default();
        let engine = make_engine(&config, api.clone());
        engine.register().await.unwrap();

        let near = Coordinates::new(45.47, 9.18);
        let menus = engine.menus_near(near).await.unwrap();
        assert_eq!(menus.len(), 2);
        assert_eq!(
            menus[0].image.as_deref(),
            Some("data:image/png;base64,blob-1")
        );
        assert_eq!(api.state.image_fetches.load(Ordering::SeqCst), 2);

        // Same versions again: everything served from the cache.
        engine.menus_near(near).await.unwrap();
        assert_eq!(api.state.image_fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn menu_detail_merges_and_records_last_menu() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(&dir);
        let engine = make_engine(&config, FakeApi::default());
        engine.register().await.unwrap();

        let near = Coordinates::new(45.47, 9.18);
        let listing = menu(3, 1, near);
        let detailed = engine.menu_detail(&listing, near).await.unwrap();

        assert_eq!(
            detailed.long_description.as_deref(),
            Some("Slow-fermented dough, stone oven")
        );
        assert_eq!(detailed.name, "Menu 3");
        assert_eq!(engine.last_menu().await.map(|m| m.mid), Some(3));
    }

    #[tokio::test]
    async fn profile_update_is_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(&dir);
        let engine = make_engine(&config, FakeApi::default());
        engine.register().await.unwrap();

        let updated = engine
            .update_profile(ProfileUpdate {
                first_name: "Grace".into(),
                last_name: "Hopper".into(),
                card_full_name: "Grace Hopper".into(),
                card_number: "4000000000000002".into(),
                card_expire_month: 1,
                card_expire_year: 2031,
                card_cvv: "999".into(),
            })
            .await
            .unwrap();
        assert!(updated.is_complete());

        let restarted = make_engine(&config, FakeApi::default());
        match restarted.bootstrap().await.unwrap() {
            Bootstrap::Restored(snapshot) => {
                assert_eq!(snapshot.session.first_name.as_deref(), Some("Grace"));
                assert!(snapshot.session.is_complete());
            }
            Bootstrap::FirstRun => panic!("session should have been restored"),
        }
    }

    #[tokio::test]
    async fn reset_all_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(&dir);
        let engine = make_engine(&config, FakeApi::default());
        engine.register().await.unwrap();
        engine
            .confirm_order(1, Coordinates::new(45.0, 9.0))
            .await
            .unwrap();
        engine.save_screen("Menu").await.unwrap();

        engine.reset_all().await.unwrap();
        engine.reset_all().await.unwrap();

        assert!(engine.session().await.is_none());
        assert!(matches!(
            engine.bootstrap().await.unwrap(),
            Bootstrap::FirstRun
        ));
    }

    #[tokio::test]
    async fn tracking_reports_order_state() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(&dir);
        let api = FakeApi::default();
        let engine = make_engine(&config, api.clone());
        engine.register().await.unwrap();

        let (tx, _rx) = mpsc::channel(4);
        assert!(matches!(
            engine.start_tracking(tx.clone()).await.unwrap(),
            Tracking::NoOrder
        ));

        engine
            .confirm_order(1, Coordinates::new(45.0, 9.0))
            .await
            .unwrap();
        match engine.start_tracking(tx.clone()).await.unwrap() {
            Tracking::Active(mut tracker) => {
                assert!(tracker.current().is_on_delivery());
                tracker.stop().await;
            }
            _ => panic!("expected an active tracker"),
        }

        api.complete_active_order();
        match engine.start_tracking(tx).await.unwrap() {
            Tracking::Delivered(order) => {
                assert_eq!(order.status, OrderStatus::Completed)
            }
            _ => panic!("expected a delivered order"),
        }
        assert_eq!(
            engine.session().await.unwrap().last_order_status,
            Some(OrderStatus::Completed)
        );
    }
}
