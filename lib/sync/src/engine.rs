//! Resource sync engine.
//!
//! Each pass lists users, roles and role bindings from the store, builds a
//! fresh [`RbacSnapshot`] and publishes it with a single pointer swap. A
//! category that cannot be fetched contributes nothing to that pass; the
//! engine itself never fails.

use arc_swap::ArcSwap;
use backbone_access::{LookupError, RoleBinding, RoleDirectory, RoleRecord, UserRecord};
use backbone_store::{Resource, ResourceKind, ResourceStore, StoreError};
use rootcause::Report;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use subtle::ConstantTimeEq;
use tokio::sync::{Mutex, watch};
use tracing::{debug, info, warn};

use crate::config::MIN_SYNC_INTERVAL;
use crate::resources::UserSpec;
use crate::secret::SecretResolver;
use crate::snapshot::{RbacSnapshot, SnapshotBuilder};
use crate::watcher::LiveConfig;

/// Default bound on a single store call.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(10);

/// Counts from one published pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncStats {
    pub generation: u64,
    pub users: usize,
    pub roles: usize,
    /// Bindings that resolved on both sides.
    pub bindings: usize,
    /// Bindings dropped because a side did not resolve.
    pub dangling: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Published(SyncStats),
    /// Another pass was already running.
    Skipped,
}

/// Mirrors RBAC resources into an in-memory snapshot.
pub struct ResourceSyncEngine {
    store: Arc<dyn ResourceStore>,
    secrets: SecretResolver,
    snapshot: ArcSwap<RbacSnapshot>,
    running: Mutex<()>,
    store_timeout: Duration,
}

impl ResourceSyncEngine {
    /// Creates an engine serving the empty snapshot until the first sync.
    #[must_use]
    pub fn new(store: Arc<dyn ResourceStore>, store_timeout: Duration) -> Self {
        let secrets = SecretResolver::new(Arc::clone(&store), store_timeout);
        Self {
            store,
            secrets,
            snapshot: ArcSwap::from_pointee(RbacSnapshot::empty()),
            running: Mutex::new(()),
            store_timeout,
        }
    }

    /// Returns the current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Arc<RbacSnapshot> {
        self.snapshot.load_full()
    }

    /// Runs one sync pass.
    ///
    /// A pass that starts while another is in progress is skipped rather
    /// than queued.
    pub async fn sync(&self) -> SyncOutcome {
        let Ok(_pass) = self.running.try_lock() else {
            debug!("sync already in progress, skipping");
            return SyncOutcome::Skipped;
        };

        let users = self.fetch(ResourceKind::User).await;
        let roles = self.fetch(ResourceKind::Role).await;
        let bindings = self.fetch(ResourceKind::RoleBinding).await;

        let mut builder = SnapshotBuilder::default();
        for resource in &users {
            match resource.spec::<UserSpec>() {
                Ok(spec) => builder.add_user(spec.user, spec.secret_ref),
                Err(report) => warn!(error = %report, "skipping malformed user"),
            }
        }
        for resource in &roles {
            match resource.spec::<RoleRecord>() {
                Ok(role) => builder.add_role(role),
                Err(report) => warn!(error = %report, "skipping malformed role"),
            }
        }

        let mut lookups = BindingLookups::default();
        let mut resolved = 0;
        let mut dangling = 0;
        for resource in &bindings {
            let binding: RoleBinding = match resource.spec() {
                Ok(binding) => binding,
                Err(report) => {
                    warn!(error = %report, "skipping malformed role binding");
                    dangling += 1;
                    continue;
                }
            };

            let user = self.lookup_user(&mut lookups, binding.user_ref()).await;
            let role = self.lookup_role(&mut lookups, binding.role_ref()).await;
            match (user, role) {
                (Some(user), Some(role)) => {
                    builder.bind(user.email(), role);
                    resolved += 1;
                }
                _ => {
                    warn!(
                        binding = resource.name(),
                        user_ref = binding.user_ref(),
                        role_ref = binding.role_ref(),
                        "dropping dangling role binding"
                    );
                    dangling += 1;
                }
            }
        }

        let generation = self.snapshot.load().generation() + 1;
        let snapshot = builder.build(generation);
        let stats = SyncStats {
            generation,
            users: snapshot.user_count(),
            roles: snapshot.role_count(),
            bindings: resolved,
            dangling,
        };
        let published_at = snapshot.published_at();
        self.snapshot.store(Arc::new(snapshot));

        info!(
            generation,
            %published_at,
            users = stats.users,
            roles = stats.roles,
            bindings = stats.bindings,
            dangling = stats.dangling,
            "published RBAC snapshot"
        );
        SyncOutcome::Published(stats)
    }

    /// Looks up a user by email in the current snapshot.
    pub fn get_user(&self, email: &str) -> Result<UserRecord, Report<LookupError>> {
        self.snapshot
            .load()
            .user(email)
            .cloned()
            .ok_or_else(|| not_found(email))
    }

    /// Returns a user's roles. A known user with no bindings gets an empty
    /// list.
    pub fn get_user_roles(&self, email: &str) -> Result<Vec<RoleRecord>, Report<LookupError>> {
        self.snapshot
            .load()
            .user_roles(email)
            .map(<[RoleRecord]>::to_vec)
            .ok_or_else(|| not_found(email))
    }

    /// Checks a candidate password against the user's secret.
    ///
    /// Returns `false` for unknown users, users without a secret reference
    /// and any failure to resolve the secret.
    pub async fn verify_password(&self, email: &str, candidate: &str) -> bool {
        let snapshot = self.snapshot();
        let Some(credentials) = snapshot.credentials(email) else {
            debug!(email, "no credentials for user");
            return false;
        };

        match self.secrets.password(credentials.secret_ref()).await {
            Ok(stored) => {
                let stored = Sha256::digest(&stored);
                let candidate = Sha256::digest(candidate.as_bytes());
                stored.as_slice().ct_eq(candidate.as_slice()).into()
            }
            Err(report) => {
                warn!(
                    error = %report,
                    email = credentials.user().email(),
                    secret = credentials.secret_ref(),
                    "cannot resolve password secret"
                );
                false
            }
        }
    }

    /// Syncs on a timer until `shutdown` fires.
    ///
    /// The interval is re-read from the live configuration before every
    /// round, falling back to `default_interval`.
    pub async fn run(
        &self,
        live: Arc<LiveConfig>,
        default_interval: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) {
        loop {
            let interval = live
                .sync_interval()
                .unwrap_or(default_interval)
                .max(MIN_SYNC_INTERVAL);

            tokio::select! {
                () = tokio::time::sleep(interval) => {
                    if self.sync().await == SyncOutcome::Skipped {
                        debug!("scheduled sync skipped");
                    }
                }
                _ = shutdown.changed() => {
                    debug!("sync loop stopping");
                    break;
                }
            }
        }
    }

    async fn fetch(&self, kind: ResourceKind) -> Vec<Resource> {
        match self.bounded(kind, self.store.list(kind)).await {
            Ok(resources) => resources,
            Err(report) => {
                warn!(error = %report, %kind, "fetch failed, using empty set");
                Vec::new()
            }
        }
    }

    async fn lookup_user(&self, lookups: &mut BindingLookups, name: &str) -> Option<UserRecord> {
        if let Some(cached) = lookups.users.get(name) {
            return cached.clone();
        }
        let user = match self.bounded(ResourceKind::User, self.store.get(ResourceKind::User, name)).await {
            Ok(resource) => resource.spec::<UserSpec>().ok().map(|spec| spec.user),
            Err(report) => {
                debug!(error = %report, name, "user lookup failed");
                None
            }
        };
        lookups.users.insert(name.to_string(), user.clone());
        user
    }

    async fn lookup_role(&self, lookups: &mut BindingLookups, name: &str) -> Option<RoleRecord> {
        if let Some(cached) = lookups.roles.get(name) {
            return cached.clone();
        }
        let role = match self.bounded(ResourceKind::Role, self.store.get(ResourceKind::Role, name)).await {
            Ok(resource) => resource.spec::<RoleRecord>().ok(),
            Err(report) => {
                debug!(error = %report, name, "role lookup failed");
                None
            }
        };
        lookups.roles.insert(name.to_string(), role.clone());
        role
    }

    async fn bounded<T>(
        &self,
        kind: ResourceKind,
        call: impl Future<Output = Result<T, Report<StoreError>>>,
    ) -> Result<T, Report<StoreError>> {
        match tokio::time::timeout(self.store_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::RequestFailed {
                kind,
                details: format!("timed out after {:?}", self.store_timeout),
            }
            .into()),
        }
    }
}

impl RoleDirectory for ResourceSyncEngine {
    fn user_roles(&self, email: &str) -> Result<Vec<RoleRecord>, Report<LookupError>> {
        self.get_user_roles(email)
    }
}

/// Point lookups memoized for one pass.
#[derive(Default)]
struct BindingLookups {
    users: HashMap<String, Option<UserRecord>>,
    roles: HashMap<String, Option<RoleRecord>>,
}

fn not_found(email: &str) -> Report<LookupError> {
    LookupError::NotFound {
        email: email.to_string(),
    }
    .into()
}
