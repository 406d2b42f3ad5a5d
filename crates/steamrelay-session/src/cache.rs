//! The per-login session cache.
//!
//! Holds at most one live session per login (case-insensitive) and hands
//! it out as a [`SessionLease`]. A lease keeps that login's slot locked,
//! so two commands for the same account never drive its cookie jar at
//! once, while commands for different accounts run in parallel.
//!
//! # Checkout flow
//!
//! ```text
//! cached? ──yes──→ validated recently? ──yes──→ lease
//!   │                    │no
//!   │               is_alive ──yes──→ lease
//!   │                    │dead/error: evict
//!   ▼                    ▼
//! load credential (MissingCredential: stop, no network)
//!   │
//! saved cookies? ──yes──→ resume + is_alive ──yes──→ cache, lease
//!   │no                         │dead
//!   ▼                           ▼
//! full login ──→ is_alive ──→ save cookies ──→ cache, lease
//! ```

use std::collections::HashMap;
use std::ops::Deref;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::Instant;

use crate::{CredentialStore, SessionBackend, SessionError, load_credential};

/// Tuning for [`SessionCache`].
#[derive(Debug, Clone)]
pub struct SessionCacheConfig {
    /// A session validated less than this long ago is handed out without
    /// checking it again.
    ///
    /// Default: 30 seconds.
    pub liveness_interval: Duration,
}

impl Default for SessionCacheConfig {
    fn default() -> Self {
        Self {
            liveness_interval: Duration::from_secs(30),
        }
    }
}

struct Cached<T> {
    session: Arc<T>,
    validated_at: Instant,
}

type Slot<T> = Arc<Mutex<Option<Cached<T>>>>;

/// Exclusive use of one login's session.
///
/// Dropping the lease releases the login for the next command.
pub struct SessionLease<T> {
    session: Arc<T>,
    guard: OwnedMutexGuard<Option<Cached<T>>>,
}

impl<T> SessionLease<T> {
    /// Drops the session from the cache; the next checkout logs in again.
    pub fn invalidate(mut self) {
        *self.guard = None;
    }

    /// Marks the session as just validated, e.g. after a successful call.
    pub fn touch(&mut self) {
        if let Some(cached) = self.guard.as_mut() {
            cached.validated_at = Instant::now();
        }
    }

    /// A shared handle to the session that outlives the lease.
    pub fn shared(&self) -> Arc<T> {
        Arc::clone(&self.session)
    }
}

impl<T> Deref for SessionLease<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.session
    }
}

/// One live session per login, built on demand.
pub struct SessionCache<B: SessionBackend, S> {
    backend: B,
    store: Arc<S>,
    config: SessionCacheConfig,
    slots: Mutex<HashMap<String, Slot<B::Session>>>,
}

impl<B: SessionBackend, S: CredentialStore> SessionCache<B, S> {
    pub fn new(backend: B, store: Arc<S>, config: SessionCacheConfig) -> Self {
        Self {
            backend,
            store,
            config,
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Returns the live session for `login`, creating it if needed.
    ///
    /// Waits while another checkout of the same login is in progress.
    ///
    /// # Errors
    /// - [`SessionError::MissingCredential`] before any network call.
    /// - Whatever the login protocol fails with; nothing is cached then.
    pub async fn checkout(&self, login: &str) -> Result<SessionLease<B::Session>, SessionError> {
        let slot = {
            let mut slots = self.slots.lock().await;
            Arc::clone(slots.entry(login.to_lowercase()).or_default())
        };
        let mut guard = slot.lock_owned().await;

        if let Some(cached) = guard.as_mut() {
            if cached.validated_at.elapsed() < self.config.liveness_interval {
                let session = Arc::clone(&cached.session);
                return Ok(SessionLease { session, guard });
            }
            match self.backend.is_alive(&cached.session).await {
                Ok(true) => {
                    cached.validated_at = Instant::now();
                    let session = Arc::clone(&cached.session);
                    return Ok(SessionLease { session, guard });
                }
                Ok(false) => tracing::info!(login, "cached session expired, evicting"),
                Err(e) => tracing::warn!(login, error = %e, "session liveness check failed, evicting"),
            }
            *guard = None;
        }

        let session = Arc::new(self.establish(login).await?);
        *guard = Some(Cached {
            session: Arc::clone(&session),
            validated_at: Instant::now(),
        });
        Ok(SessionLease { session, guard })
    }

    async fn establish(&self, login: &str) -> Result<B::Session, SessionError> {
        let credential = load_credential(&*self.store, login).await?;

        if let Some(cookies) = &credential.cookies {
            match self.backend.resume(&credential, cookies).await {
                Ok(session) => match self.backend.is_alive(&session).await {
                    Ok(true) => {
                        tracing::info!(login, "resumed session from saved cookies");
                        return Ok(session);
                    }
                    Ok(false) => tracing::debug!(login, "saved cookies are stale"),
                    Err(e) => tracing::debug!(login, error = %e, "liveness check of resumed session failed"),
                },
                Err(e) => tracing::debug!(login, error = %e, "cookie resume failed"),
            }
        }

        let session = self.backend.login(&credential).await?;
        if !self.backend.is_alive(&session).await? {
            return Err(SessionError::NotAlive(login.to_owned()));
        }
        let cookies = self.backend.export_cookies(&session);
        if let Err(e) = self.store.save_cookies(login, &cookies).await {
            tracing::warn!(login, error = %e, "could not persist session cookies");
        }
        Ok(session)
    }

    /// Drops the session of `login`, waiting for any lease on it.
    ///
    /// The slot itself stays, so a checkout racing the eviction queues
    /// behind the current lease instead of building a second session.
    pub async fn evict(&self, login: &str) {
        let slot = self.slots.lock().await.get(&login.to_lowercase()).cloned();
        if let Some(slot) = slot {
            *slot.lock().await = None;
            tracing::debug!(login, "session evicted");
        }
    }

    /// Forgets every cached session, waiting for outstanding leases.
    pub async fn logout_all(&self) {
        let slots: Vec<_> = self.slots.lock().await.values().cloned().collect();
        let mut count = 0usize;
        for slot in slots {
            if slot.lock().await.take().is_some() {
                count += 1;
            }
        }
        tracing::info!(count, "cleared session cache");
    }

    /// Number of logins holding a session. A leased slot counts as live.
    pub async fn len(&self) -> usize {
        let slots = self.slots.lock().await;
        slots
            .values()
            .filter(|slot| slot.try_lock().map_or(true, |cached| cached.is_some()))
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use super::*;
    use crate::{
        AccountRecord, CookieSnapshot, Credential, GuardSecrets, LoginStep,
        MemoryCredentialStore,
    };

    #[derive(Default)]
    struct FakeBackend {
        logins: AtomicUsize,
        resumes: AtomicUsize,
        alive_checks: AtomicUsize,
        dead: AtomicBool,
        fail_login: AtomicBool,
    }

    #[derive(Debug)]
    struct FakeSession {
        login: String,
        generation: usize,
    }

    impl SessionBackend for FakeBackend {
        type Session = FakeSession;

        async fn login(&self, credential: &Credential) -> Result<FakeSession, SessionError> {
            if self.fail_login.load(Ordering::SeqCst) {
                return Err(SessionError::protocol(LoginStep::Polled, "rejected"));
            }
            let generation = self.logins.fetch_add(1, Ordering::SeqCst) + 1;
            self.dead.store(false, Ordering::SeqCst);
            Ok(FakeSession {
                login: credential.login.clone(),
                generation,
            })
        }

        async fn resume(
            &self,
            credential: &Credential,
            _cookies: &CookieSnapshot,
        ) -> Result<FakeSession, SessionError> {
            self.resumes.fetch_add(1, Ordering::SeqCst);
            Ok(FakeSession {
                login: credential.login.clone(),
                generation: 0,
            })
        }

        async fn is_alive(&self, _session: &FakeSession) -> Result<bool, SessionError> {
            self.alive_checks.fetch_add(1, Ordering::SeqCst);
            Ok(!self.dead.load(Ordering::SeqCst))
        }

        fn export_cookies(&self, session: &FakeSession) -> CookieSnapshot {
            CookieSnapshot::from([("owner".to_owned(), session.login.clone())])
        }
    }

    fn record(cookies: Option<CookieSnapshot>) -> AccountRecord {
        AccountRecord {
            password: Some("pw".into()),
            secrets: Some(GuardSecrets {
                steamid: "76561197960287930".into(),
                shared_secret: "MTIzNDU2Nzg5MDEyMzQ1Njc4OTA=".into(),
                identity_secret: "MTIzNDU2Nzg5MDEyMzQ1Njc4OTA=".into(),
            }),
            api_key: Some("KEY".into()),
            cookies,
        }
    }

    async fn cache_with(
        accounts: &[(&str, Option<CookieSnapshot>)],
    ) -> SessionCache<FakeBackend, MemoryCredentialStore> {
        let store = MemoryCredentialStore::new();
        for (login, cookies) in accounts {
            store.insert(login, record(cookies.clone())).await;
        }
        SessionCache::new(
            FakeBackend::default(),
            Arc::new(store),
            SessionCacheConfig::default(),
        )
    }

    fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    #[tokio::test]
    async fn test_checkout_first_call_logs_in_and_saves_cookies() {
        let cache = cache_with(&[("alice", None)]).await;

        let lease = cache.checkout("alice").await.unwrap();
        assert_eq!(lease.generation, 1);
        drop(lease);

        assert_eq!(count(&cache.backend().logins), 1);
        let saved = cache.store().get("alice").await.unwrap().cookies.unwrap();
        assert_eq!(saved.get("owner").map(String::as_str), Some("alice"));
    }

    #[tokio::test]
    async fn test_checkout_twice_on_live_handle_checks_once() {
        tokio::time::pause();
        let cache = cache_with(&[("alice", None)]).await;
        drop(cache.checkout("alice").await.unwrap());
        let checks_after_login = count(&cache.backend().alive_checks);

        tokio::time::advance(Duration::from_secs(31)).await;
        drop(cache.checkout("alice").await.unwrap());
        drop(cache.checkout("alice").await.unwrap());

        assert_eq!(count(&cache.backend().alive_checks) - checks_after_login, 1);
        assert_eq!(count(&cache.backend().logins), 1);
    }

    #[tokio::test]
    async fn test_checkout_dead_handle_is_replaced() {
        tokio::time::pause();
        let cache = cache_with(&[("alice", None)]).await;
        drop(cache.checkout("alice").await.unwrap());

        cache.backend().dead.store(true, Ordering::SeqCst);
        tokio::time::advance(Duration::from_secs(31)).await;
        let lease = cache.checkout("alice").await.unwrap();

        assert_eq!(lease.generation, 2);
        assert_eq!(count(&cache.backend().logins), 2);
    }

    #[tokio::test]
    async fn test_checkout_live_cookies_skip_login() {
        let cookies = CookieSnapshot::from([("steamLoginSecure".to_owned(), "x".to_owned())]);
        let cache = cache_with(&[("alice", Some(cookies))]).await;

        let lease = cache.checkout("alice").await.unwrap();
        assert_eq!(lease.generation, 0);
        assert_eq!(count(&cache.backend().resumes), 1);
        assert_eq!(count(&cache.backend().logins), 0);
    }

    #[tokio::test]
    async fn test_checkout_stale_cookies_fall_back_to_login() {
        let cookies = CookieSnapshot::from([("steamLoginSecure".to_owned(), "x".to_owned())]);
        let cache = cache_with(&[("alice", Some(cookies))]).await;
        cache.backend().dead.store(true, Ordering::SeqCst);

        let lease = cache.checkout("alice").await.unwrap();
        assert_eq!(lease.generation, 1);
        assert_eq!(count(&cache.backend().resumes), 1);
    }

    #[tokio::test]
    async fn test_checkout_missing_credential_makes_no_backend_call() {
        let cache = cache_with(&[]).await;

        let err = cache.checkout("ghost").await.err().unwrap();
        assert!(matches!(err, SessionError::MissingCredential { .. }));
        assert_eq!(count(&cache.backend().logins), 0);
        assert_eq!(count(&cache.backend().alive_checks), 0);
    }

    #[tokio::test]
    async fn test_checkout_failed_login_caches_nothing() {
        let cache = cache_with(&[("alice", None)]).await;
        cache.backend().fail_login.store(true, Ordering::SeqCst);
        assert!(cache.checkout("alice").await.is_err());

        cache.backend().fail_login.store(false, Ordering::SeqCst);
        let lease = cache.checkout("alice").await.unwrap();
        assert_eq!(lease.generation, 1);
    }

    #[tokio::test]
    async fn test_checkout_concurrent_same_login_logs_in_once() {
        let cache = Arc::new(cache_with(&[("alice", None)]).await);

        let tasks: Vec<_> = (0..4)
            .map(|_| {
                let cache = Arc::clone(&cache);
                tokio::spawn(async move { cache.checkout("ALICE").await.map(|l| l.generation) })
            })
            .collect();
        for task in tasks {
            assert_eq!(task.await.unwrap().unwrap(), 1);
        }
        assert_eq!(count(&cache.backend().logins), 1);
    }

    #[tokio::test]
    async fn test_lease_on_one_login_does_not_block_another() {
        let cache = cache_with(&[("alice", None), ("bob", None)]).await;
        let _alice = cache.checkout("alice").await.unwrap();

        let bob = tokio::time::timeout(Duration::from_secs(1), cache.checkout("bob"))
            .await
            .expect("bob must not wait on alice")
            .unwrap();
        assert_eq!(bob.login, "bob");
    }

    #[tokio::test]
    async fn test_invalidate_forces_new_session() {
        let cache = cache_with(&[("alice", None)]).await;
        cache.checkout("alice").await.unwrap().invalidate();

        // Cookies saved by the first login are resumed.
        let lease = cache.checkout("alice").await.unwrap();
        assert_eq!(lease.generation, 0);
        assert_eq!(count(&cache.backend().resumes), 1);
        lease.invalidate();

        cache.backend().dead.store(true, Ordering::SeqCst);
        let lease = cache.checkout("alice").await.unwrap();
        assert_eq!(lease.generation, 2);
        assert_eq!(count(&cache.backend().logins), 2);
    }

    #[tokio::test]
    async fn test_logout_all_empties_cache() {
        let cache = cache_with(&[("alice", None), ("bob", None)]).await;
        drop(cache.checkout("alice").await.unwrap());
        drop(cache.checkout("bob").await.unwrap());
        assert_eq!(cache.len().await, 2);

        cache.logout_all().await;
        assert!(cache.is_empty().await);

        cache.evict("alice").await;
        let lease = cache.checkout("alice").await.unwrap();
        assert_eq!(lease.generation, 0);
        assert_eq!(count(&cache.backend().resumes), 1);
        assert_eq!(count(&cache.backend().logins), 2);
        drop(lease);
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_logout_all_waits_for_held_lease() {
        let cache = Arc::new(cache_with(&[("alice", None)]).await);
        let held = cache.checkout("alice").await.unwrap();
        let first = held.shared();

        let clearing = tokio::spawn({
            let cache = Arc::clone(&cache);
            async move { cache.logout_all().await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!clearing.is_finished());

        let second = tokio::time::timeout(Duration::from_millis(50), cache.checkout("alice")).await;
        assert!(second.is_err(), "a second session was built while the first was leased");

        drop(held);
        clearing.await.unwrap();
        let lease = cache.checkout("alice").await.unwrap();
        assert!(!Arc::ptr_eq(&first, &lease.shared()));
        assert_eq!(count(&cache.backend().logins), 1);
    }

    #[tokio::test]
    async fn test_evict_waits_for_held_lease() {
        let cache = Arc::new(cache_with(&[("alice", None)]).await);
        let held = cache.checkout("alice").await.unwrap();

        let evicting = tokio::spawn({
            let cache = Arc::clone(&cache);
            async move { cache.evict("ALICE").await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        let second = tokio::time::timeout(Duration::from_millis(50), cache.checkout("alice")).await;
        assert!(second.is_err(), "a second session was built while the first was leased");
        assert_eq!(cache.len().await, 1);

        drop(held);
        evicting.await.unwrap();
        assert!(cache.is_empty().await);
    }
}
