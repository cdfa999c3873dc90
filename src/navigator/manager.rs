//! SceneNavigator — applies validated transitions, gates the entry scene
//! behind an identity check, and persists the current scene per session.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::error::{DatabaseError, NavigatorError};
use crate::identity::{IdentityProvider, User};
use crate::profile::ProfileProvisioner;
use crate::store::Database;

use super::scene::{Scene, Trigger, requires_identity};
use super::state::NavigatorState;

/// Settings key the current scene is stored under.
pub const SCENE_KEY: &str = "current_scene";

/// What an `advance` call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceOutcome {
    Moved { from: Scene, to: Scene },
    /// No edge for this trigger from the current scene.
    Ignored,
    /// A guarded transition is already in flight.
    Busy,
    /// The visitor must sign in, then call `advance` again.
    AuthenticationRequired,
}

impl AdvanceOutcome {
    pub fn is_moved(&self) -> bool {
        matches!(self, Self::Moved { .. })
    }
}

pub struct SceneNavigator {
    db: Arc<dyn Database>,
    identity: Arc<dyn IdentityProvider>,
    provisioner: Arc<ProfileProvisioner>,
    session_key: String,
    state: Mutex<NavigatorState>,
    /// Set while the entry gate is checking identity. Only flipped to
    /// `true` under the `state` lock.
    pending: AtomicBool,
    provisioning: Mutex<JoinSet<()>>,
}

/// Clears the pending flag when the guarded check ends, including when the
/// `advance` future is dropped mid-check.
struct PendingGuard<'a>(&'a AtomicBool);

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl SceneNavigator {
    /// A navigator at the entry scene. Call `restore` to load the session.
    pub fn new(
        db: Arc<dyn Database>,
        identity: Arc<dyn IdentityProvider>,
        provisioner: Arc<ProfileProvisioner>,
        session_key: impl Into<String>,
    ) -> Self {
        Self {
            db,
            identity,
            provisioner,
            session_key: session_key.into(),
            state: Mutex::new(NavigatorState::default()),
            pending: AtomicBool::new(false),
            provisioning: Mutex::new(JoinSet::new()),
        }
    }

    /// Construct and restore in one step.
    pub async fn open(
        db: Arc<dyn Database>,
        identity: Arc<dyn IdentityProvider>,
        provisioner: Arc<ProfileProvisioner>,
        session_key: impl Into<String>,
    ) -> Result<Self, NavigatorError> {
        let navigator = Self::new(db, identity, provisioner, session_key);
        navigator.restore().await?;
        Ok(navigator)
    }

    pub fn session_key(&self) -> &str {
        &self.session_key
    }

    pub async fn current_scene(&self) -> Scene {
        self.state.lock().await.current_scene
    }

    pub async fn state(&self) -> NavigatorState {
        let mut state = self.state.lock().await.clone();
        state.pending = self.pending.load(Ordering::Acquire);
        state
    }

    /// Load the persisted scene for this session. Falls back to the entry
    /// scene when nothing (or nothing readable) is stored. A guarded check
    /// already in flight stays in flight.
    pub async fn restore(&self) -> Result<Scene, NavigatorError> {
        let stored = match self.db.get_setting(&self.session_key, SCENE_KEY).await {
            Ok(stored) => stored,
            Err(DatabaseError::Serialization(reason)) => {
                warn!(session = %self.session_key, %reason, "Corrupt stored scene, starting at entry");
                None
            }
            Err(e) => return Err(e.into()),
        };
        let scene = match stored {
            Some(value) => match serde_json::from_value::<Scene>(value.clone()) {
                Ok(scene) => scene,
                Err(_) => {
                    warn!(session = %self.session_key, stored = %value, "Unrecognized stored scene, starting at entry");
                    Scene::Entry
                }
            },
            None => Scene::Entry,
        };

        self.state.lock().await.current_scene = scene;
        debug!(session = %self.session_key, %scene, "Navigator restored");
        Ok(scene)
    }

    /// Parse `label` and advance. Unknown labels are ignored.
    pub async fn advance_label(&self, label: &str) -> Result<AdvanceOutcome, NavigatorError> {
        match label.trim().parse::<Trigger>() {
            Ok(trigger) => self.advance(trigger).await,
            Err(_) => {
                debug!(label, "Ignoring unknown trigger");
                Ok(AdvanceOutcome::Ignored)
            }
        }
    }

    /// Apply `trigger` to the current scene.
    ///
    /// The scene only changes once the new value is persisted. While the
    /// entry gate is checking identity, every call returns `Busy`.
    pub async fn advance(&self, trigger: Trigger) -> Result<AdvanceOutcome, NavigatorError> {
        let mut state = self.state.lock().await;
        if self.pending.load(Ordering::Acquire) {
            debug!(session = %self.session_key, %trigger, "Transition in flight, ignoring");
            return Ok(AdvanceOutcome::Busy);
        }

        let from = state.current_scene;
        let Some(to) = from.successor(trigger) else {
            debug!(session = %self.session_key, %from, %trigger, "No transition");
            return Ok(AdvanceOutcome::Ignored);
        };

        if requires_identity(from, trigger) {
            self.pending.store(true, Ordering::Release);
            let _pending = PendingGuard(&self.pending);
            drop(state);
            return self.guarded_advance(from, to).await;
        }

        self.commit(&mut state, from, to).await
    }

    /// Wait for every background provisioning task spawned so far.
    pub async fn settle(&self) {
        let mut tasks = std::mem::take(&mut *self.provisioning.lock().await);
        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                warn!(error = %e, "Provisioning task panicked");
            }
        }
    }

    async fn guarded_advance(&self, from: Scene, to: Scene) -> Result<AdvanceOutcome, NavigatorError> {
        let user = match self.identity.current_user().await {
            Ok(user) => user.filter(User::is_signed_in),
            Err(e) => {
                warn!(session = %self.session_key, error = %e, "Identity check failed");
                return Err(e.into());
            }
        };

        let Some(user) = user else {
            info!(session = %self.session_key, "Authentication required to leave entry");
            return Ok(AdvanceOutcome::AuthenticationRequired);
        };

        self.spawn_provisioning(user).await;

        let mut state = self.state.lock().await;
        self.commit(&mut state, from, to).await
    }

    async fn commit(
        &self,
        state: &mut NavigatorState,
        from: Scene,
        to: Scene,
    ) -> Result<AdvanceOutcome, NavigatorError> {
        let value = serde_json::to_value(to)
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?;
        self.db
            .set_setting(&self.session_key, SCENE_KEY, &value)
            .await
            .inspect_err(|e| {
                warn!(session = %self.session_key, %from, %to, error = %e, "Failed to persist scene");
            })?;

        state.current_scene = to;
        info!(session = %self.session_key, %from, %to, "Scene changed");
        Ok(AdvanceOutcome::Moved { from, to })
    }

    async fn spawn_provisioning(&self, user: User) {
        let provisioner = Arc::clone(&self.provisioner);
        let mut tasks = self.provisioning.lock().await;
        // Reap finished tasks so the set only holds work still running.
        while let Some(result) = tasks.try_join_next() {
            if let Err(e) = result {
                warn!(error = %e, "Provisioning task panicked");
            }
        }
        tasks.spawn(async move {
            match provisioner
                .create_or_get_profile(&user.id, user.email.as_deref(), user.full_name())
                .await
            {
                Ok(profile) => {
                    debug!(user_id = %profile.id, username = %profile.username, "Profile ready");
                }
                Err(e) => {
                    warn!(user_id = %user.id, error = %e, "Background provisioning failed");
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::config::ProvisionerConfig;
    use crate::error::{DatabaseError, IdentityError};
    use crate::store::LibSqlBackend;

    struct StubIdentity {
        user: StdMutex<Option<User>>,
        calls: AtomicU32,
        delay: Duration,
        fail: bool,
    }

    impl StubIdentity {
        fn new(user: Option<User>) -> Arc<Self> {
            Arc::new(Self {
                user: StdMutex::new(user),
                calls: AtomicU32::new(0),
                delay: Duration::ZERO,
                fail: false,
            })
        }
    }

    #[async_trait]
    impl IdentityProvider for StubIdentity {
        async fn current_user(&self) -> Result<Option<User>, IdentityError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.fail {
                return Err(IdentityError::Unavailable("connection refused".into()));
            }
            Ok(self.user.lock().unwrap().clone())
        }
        async fn sign_in_with_password(&self, _: &str, _: &str) -> Result<User, IdentityError> {
            unimplemented!("not used in navigator tests")
        }
        async fn sign_up(
            &self,
            _: &str,
            _: &str,
            _: serde_json::Value,
        ) -> Result<Option<User>, IdentityError> {
            unimplemented!("not used in navigator tests")
        }
        async fn oauth_authorize_url(&self, _: &str, _: Option<&str>) -> Result<String, IdentityError> {
            unimplemented!("not used in navigator tests")
        }
        async fn sign_out(&self) -> Result<(), IdentityError> {
            Ok(())
        }
        async fn reset_password(&self, _: &str) -> Result<(), IdentityError> {
            Ok(())
        }
        async fn update_password(&self, _: &str) -> Result<(), IdentityError> {
            Ok(())
        }
    }

    async fn navigator_with(
        identity: Arc<StubIdentity>,
    ) -> (SceneNavigator, Arc<LibSqlBackend>) {
        let db = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let provisioner = Arc::new(ProfileProvisioner::new(
            db.clone(),
            ProvisionerConfig::default(),
        ));
        let nav = SceneNavigator::open(db.clone(), identity, provisioner, "s1")
            .await
            .unwrap();
        (nav, db)
    }

    fn signed_in() -> Option<User> {
        Some(User::new("u1", Some("a@b.com")))
    }

    #[tokio::test]
    async fn starts_at_entry() {
        let (nav, _) = navigator_with(StubIdentity::new(None)).await;
        assert_eq!(nav.current_scene().await, Scene::Entry);
        assert!(!nav.state().await.pending);
    }

    #[tokio::test]
    async fn undefined_trigger_is_noop() {
        let (nav, db) = navigator_with(StubIdentity::new(signed_in())).await;

        for trigger in [Trigger::Back, Trigger::GoLeft, Trigger::Exit, Trigger::FloorSelect] {
            assert_eq!(nav.advance(trigger).await.unwrap(), AdvanceOutcome::Ignored);
            assert_eq!(nav.current_scene().await, Scene::Entry);
        }
        assert!(db.get_setting("s1", SCENE_KEY).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unknown_label_is_noop() {
        let (nav, _) = navigator_with(StubIdentity::new(signed_in())).await;
        assert_eq!(
            nav.advance_label("teleport").await.unwrap(),
            AdvanceOutcome::Ignored
        );
        assert_eq!(nav.current_scene().await, Scene::Entry);
    }

    #[tokio::test]
    async fn entry_requires_authentication() {
        let identity = StubIdentity::new(None);
        let (nav, db) = navigator_with(identity.clone()).await;

        let outcome = nav.advance(Trigger::Next).await.unwrap();
        assert_eq!(outcome, AdvanceOutcome::AuthenticationRequired);
        assert_eq!(nav.current_scene().await, Scene::Entry);
        assert!(!nav.state().await.pending);

        // User without an email does not count as signed in
        *identity.user.lock().unwrap() = Some(User::new("u1", None));
        let outcome = nav.advance(Trigger::Next).await.unwrap();
        assert_eq!(outcome, AdvanceOutcome::AuthenticationRequired);

        // After signing in, re-invoking advance succeeds
        *identity.user.lock().unwrap() = signed_in();
        let outcome = nav.advance(Trigger::Next).await.unwrap();
        assert_eq!(
            outcome,
            AdvanceOutcome::Moved {
                from: Scene::Entry,
                to: Scene::Intro
            }
        );
        nav.settle().await;
        assert!(db.find_profile_by_id("u1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn identity_failure_does_not_move() {
        let identity = Arc::new(StubIdentity {
            user: StdMutex::new(signed_in()),
            calls: AtomicU32::new(0),
            delay: Duration::ZERO,
            fail: true,
        });
        let (nav, _) = navigator_with(identity).await;

        let err = nav.advance(Trigger::Next).await.unwrap_err();
        assert!(matches!(err, NavigatorError::Identity(_)));
        assert_eq!(nav.current_scene().await, Scene::Entry);
        assert!(!nav.state().await.pending);
    }

    #[tokio::test]
    async fn concurrent_next_moves_once() {
        let identity = Arc::new(StubIdentity {
            user: StdMutex::new(signed_in()),
            calls: AtomicU32::new(0),
            delay: Duration::from_millis(50),
            fail: false,
        });
        let (nav, db) = navigator_with(identity.clone()).await;

        let (a, b) = tokio::join!(nav.advance(Trigger::Next), nav.advance(Trigger::Next));
        let outcomes = [a.unwrap(), b.unwrap()];

        assert_eq!(outcomes.iter().filter(|o| o.is_moved()).count(), 1);
        assert_eq!(
            outcomes
                .iter()
                .filter(|o| **o == AdvanceOutcome::Busy)
                .count(),
            1
        );
        assert_eq!(identity.calls.load(Ordering::SeqCst), 1);
        assert_eq!(nav.current_scene().await, Scene::Intro);

        nav.settle().await;
        let profile = db.find_profile_by_id("u1").await.unwrap().unwrap();
        assert!(profile.username.starts_with('a'));
    }

    #[tokio::test]
    async fn ungated_transitions_skip_identity() {
        let identity = StubIdentity::new(signed_in());
        let (nav, _) = navigator_with(identity.clone()).await;

        nav.advance(Trigger::Next).await.unwrap();
        let calls_after_gate = identity.calls.load(Ordering::SeqCst);

        for (trigger, expected) in [
            (Trigger::Next, Scene::Hub),
            (Trigger::GoLeft, Scene::RoomA),
            (Trigger::Back, Scene::Hub),
            (Trigger::GoRight, Scene::RoomB),
            (Trigger::Back, Scene::Hub),
            (Trigger::EnterLift, Scene::LiftInterior),
            (Trigger::CallLift, Scene::Transition),
            (Trigger::ExitLift, Scene::DestinationFloor),
            (Trigger::Exit, Scene::Entry),
        ] {
            let outcome = nav.advance(trigger).await.unwrap();
            assert!(outcome.is_moved(), "{trigger} should move");
            assert_eq!(nav.current_scene().await, expected);
        }
        assert_eq!(identity.calls.load(Ordering::SeqCst), calls_after_gate);
    }

    #[tokio::test]
    async fn every_transition_is_persisted() {
        let (nav, db) = navigator_with(StubIdentity::new(signed_in())).await;

        nav.advance(Trigger::Next).await.unwrap();
        nav.advance(Trigger::Next).await.unwrap();
        nav.advance(Trigger::GoLeft).await.unwrap();

        let stored = db.get_setting("s1", SCENE_KEY).await.unwrap();
        assert_eq!(stored, Some(serde_json::json!("room-a")));
    }

    #[tokio::test]
    async fn restore_falls_back_on_garbage() {
        let db = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        db.set_setting("s1", SCENE_KEY, &serde_json::json!("basement"))
            .await
            .unwrap();
        let provisioner = Arc::new(ProfileProvisioner::new(
            db.clone(),
            ProvisionerConfig::default(),
        ));

        let nav = SceneNavigator::open(db.clone(), StubIdentity::new(None), provisioner.clone(), "s1")
            .await
            .unwrap();
        assert_eq!(nav.current_scene().await, Scene::Entry);

        db.set_setting("s2", SCENE_KEY, &serde_json::json!(42))
            .await
            .unwrap();
        let nav = SceneNavigator::open(db, StubIdentity::new(None), provisioner, "s2")
            .await
            .unwrap();
        assert_eq!(nav.current_scene().await, Scene::Entry);
    }

    /// Delegates to an in-memory backend, with injectable faults.
    #[derive(Default)]
    struct FaultyDb {
        inner: Option<LibSqlBackend>,
        /// Settings writes fail.
        read_only_settings: bool,
        /// Settings reads report a corrupt value.
        corrupt_settings: bool,
        /// Profile lookups for this id stall first.
        slow_user: Option<&'static str>,
    }

    impl FaultyDb {
        async fn new() -> Self {
            Self {
                inner: Some(LibSqlBackend::new_memory().await.unwrap()),
                ..Self::default()
            }
        }

        fn inner(&self) -> &LibSqlBackend {
            self.inner.as_ref().unwrap()
        }
    }

    #[async_trait]
    impl Database for FaultyDb {
        async fn init_schema(&self) -> Result<(), DatabaseError> {
            self.inner().init_schema().await
        }
        async fn find_profile_by_id(
            &self,
            id: &str,
        ) -> Result<Option<crate::profile::Profile>, DatabaseError> {
            if self.slow_user == Some(id) {
                tokio::time::sleep(Duration::from_millis(150)).await;
            }
            self.inner().find_profile_by_id(id).await
        }
        async fn find_profile_by_username(
            &self,
            username: &str,
        ) -> Result<Option<crate::profile::Profile>, DatabaseError> {
            self.inner().find_profile_by_username(username).await
        }
        async fn create_profile(
            &self,
            profile: &crate::profile::Profile,
        ) -> Result<crate::store::InsertOutcome, DatabaseError> {
            self.inner().create_profile(profile).await
        }
        async fn get_setting(
            &self,
            session_id: &str,
            key: &str,
        ) -> Result<Option<serde_json::Value>, DatabaseError> {
            if self.corrupt_settings {
                return Err(DatabaseError::Serialization(format!(
                    "setting {session_id}/{key} holds \"room-a\": expected value"
                )));
            }
            self.inner().get_setting(session_id, key).await
        }
        async fn set_setting(
            &self,
            session_id: &str,
            key: &str,
            value: &serde_json::Value,
        ) -> Result<(), DatabaseError> {
            if self.read_only_settings {
                return Err(DatabaseError::Query("disk I/O error".into()));
            }
            self.inner().set_setting(session_id, key, value).await
        }
        async fn delete_setting(&self, session_id: &str, key: &str) -> Result<bool, DatabaseError> {
            self.inner().delete_setting(session_id, key).await
        }
    }

    async fn navigator_over(
        db: FaultyDb,
        identity: Arc<StubIdentity>,
    ) -> (SceneNavigator, Arc<FaultyDb>) {
        let db = Arc::new(db);
        let provisioner = Arc::new(ProfileProvisioner::new(
            db.clone(),
            ProvisionerConfig::default(),
        ));
        let nav = SceneNavigator::open(db.clone(), identity, provisioner, "s1")
            .await
            .unwrap();
        (nav, db)
    }

    fn slow_identity(user: Option<User>, delay: Duration) -> Arc<StubIdentity> {
        Arc::new(StubIdentity {
            user: StdMutex::new(user),
            calls: AtomicU32::new(0),
            delay,
            fail: false,
        })
    }

    #[tokio::test]
    async fn persistence_failure_does_not_move() {
        let db = FaultyDb {
            read_only_settings: true,
            ..FaultyDb::new().await
        };
        let (nav, _) = navigator_over(db, StubIdentity::new(signed_in())).await;

        let err = nav.advance(Trigger::Next).await.unwrap_err();
        assert!(matches!(err, NavigatorError::Persistence(_)));
        assert_eq!(nav.current_scene().await, Scene::Entry);
        assert!(!nav.state().await.pending);
        nav.settle().await;
    }

    #[tokio::test]
    async fn cancelled_identity_check_releases_gate() {
        let identity = slow_identity(signed_in(), Duration::from_millis(200));
        let (nav, _) = navigator_with(identity.clone()).await;

        let cancelled =
            tokio::time::timeout(Duration::from_millis(20), nav.advance(Trigger::Next)).await;
        assert!(cancelled.is_err());
        assert!(!nav.state().await.pending);
        assert_eq!(nav.current_scene().await, Scene::Entry);

        let outcome = nav.advance(Trigger::Next).await.unwrap();
        assert_eq!(
            outcome,
            AdvanceOutcome::Moved {
                from: Scene::Entry,
                to: Scene::Intro
            }
        );
        assert_eq!(identity.calls.load(Ordering::SeqCst), 2);
        nav.settle().await;
    }

    #[tokio::test]
    async fn restore_keeps_in_flight_check() {
        let identity = slow_identity(signed_in(), Duration::from_millis(100));
        let (nav, _) = navigator_with(identity.clone()).await;

        let (first, second) = tokio::join!(nav.advance(Trigger::Next), async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            assert!(nav.state().await.pending);
            nav.restore().await.unwrap();
            nav.advance(Trigger::Next).await
        });

        assert!(first.unwrap().is_moved());
        assert_eq!(second.unwrap(), AdvanceOutcome::Busy);
        assert_eq!(identity.calls.load(Ordering::SeqCst), 1);
        nav.settle().await;
    }

    #[tokio::test]
    async fn settle_waits_for_every_provisioning_task() {
        let db = FaultyDb {
            slow_user: Some("u1"),
            ..FaultyDb::new().await
        };
        let identity = StubIdentity::new(signed_in());
        let (nav, db) = navigator_over(db, identity.clone()).await;

        // First lap provisions u1 slowly
        for trigger in [
            Trigger::Next,
            Trigger::Next,
            Trigger::EnterLift,
            Trigger::FloorSelect,
            Trigger::Exit,
        ] {
            assert!(nav.advance(trigger).await.unwrap().is_moved());
        }

        // Second lap as a different user
        *identity.user.lock().unwrap() = Some(User::new("u2", Some("b@c.com")));
        assert!(nav.advance(Trigger::Next).await.unwrap().is_moved());

        nav.settle().await;
        assert!(db.find_profile_by_id("u2").await.unwrap().is_some());
        assert!(db.inner().find_profile_by_id("u1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn restore_falls_back_on_corrupt_setting() {
        let db = FaultyDb {
            corrupt_settings: true,
            ..FaultyDb::new().await
        };
        let (nav, _) = navigator_over(db, StubIdentity::new(None)).await;
        assert_eq!(nav.current_scene().await, Scene::Entry);
    }
}
