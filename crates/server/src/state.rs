//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::catalog::{CatalogClient, CatalogError};
use crate::config::ServerConfig;
use crate::db::{
    LedgerStore, MemoryIdentityStore, MemoryLedgerStore, MemoryProfileStore, PgIdentityStore,
    PgLedgerStore, PgProfileStore, ProfileStore,
};
use crate::ledger::RequestLedger;
use crate::services::{AuthService, EchoBook, IdentityProvider, SubmissionService};

/// The storage backends behind the services.
#[derive(Clone)]
pub struct Stores {
    pub identity: Arc<dyn IdentityProvider>,
    pub profiles: Arc<dyn ProfileStore>,
    pub ledger: Arc<dyn LedgerStore>,
}

impl Stores {
    /// `PostgreSQL`-backed stores sharing `pool`.
    #[must_use]
    pub fn postgres(pool: &PgPool) -> Self {
        Self {
            identity: Arc::new(PgIdentityStore::new(pool.clone())),
            profiles: Arc::new(PgProfileStore::new(pool.clone())),
            ledger: Arc::new(PgLedgerStore::new(pool.clone())),
        }
    }

    /// Process-local stores. Everything is lost on restart.
    #[must_use]
    pub fn memory() -> Self {
        Self {
            identity: Arc::new(MemoryIdentityStore::new()),
            profiles: Arc::new(MemoryProfileStore::new()),
            ledger: Arc::new(MemoryLedgerStore::new()),
        }
    }
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like the services and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ServerConfig,
    pool: Option<PgPool>,
    catalog: CatalogClient,
    auth: AuthService,
    profiles: Arc<dyn ProfileStore>,
    ledger: RequestLedger,
    submissions: SubmissionService,
}

impl AppState {
    /// Create the application state, using `PostgreSQL` stores when a pool is
    /// given and in-memory stores otherwise.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog HTTP client cannot be built.
    pub fn new(config: ServerConfig, pool: Option<PgPool>) -> Result<Self, CatalogError> {
        let stores = pool.as_ref().map_or_else(Stores::memory, Stores::postgres);
        Self::with_stores(config, stores, pool)
    }

    /// Create the application state over explicit stores.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog HTTP client cannot be built.
    pub fn with_stores(
        config: ServerConfig,
        stores: Stores,
        pool: Option<PgPool>,
    ) -> Result<Self, CatalogError> {
        let catalog = CatalogClient::new(&config.catalog)?;
        let auth = AuthService::new(stores.identity, Arc::clone(&stores.profiles));
        let ledger = RequestLedger::new(
            stores.ledger,
            Arc::new(catalog.clone()),
            config.ledger_poll_interval,
        );
        let submissions = SubmissionService::new(catalog.clone(), Arc::new(EchoBook::new()));

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                catalog,
                auth,
                profiles: stores.profiles,
                ledger,
                submissions,
            }),
        })
    }

    /// Get a reference to the server configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    /// The database pool, when running against `PostgreSQL`.
    #[must_use]
    pub fn pool(&self) -> Option<&PgPool> {
        self.inner.pool.as_ref()
    }

    /// Get a reference to the catalog client.
    #[must_use]
    pub fn catalog(&self) -> &CatalogClient {
        &self.inner.catalog
    }

    /// Get a reference to the authentication service.
    #[must_use]
    pub fn auth(&self) -> &AuthService {
        &self.inner.auth
    }

    /// Get a reference to the profile store.
    #[must_use]
    pub fn profiles(&self) -> &dyn ProfileStore {
        self.inner.profiles.as_ref()
    }

    /// Get a reference to the request ledger.
    #[must_use]
    pub fn ledger(&self) -> &RequestLedger {
        &self.inner.ledger
    }

    /// Get a reference to the submission service.
    #[must_use]
    pub fn submissions(&self) -> &SubmissionService {
        &self.inner.submissions
    }
}
