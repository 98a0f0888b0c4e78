//! Provider capabilities for dependency injection.
//!
//! A provider hands out a client or database handle on demand. Any closure returning a
//! handle is a provider, so the host application can plug in whatever injection mechanism
//! it uses.

use crate::backend::Database;

/// Supplies a store client.
pub trait ClientProvider: Send + Sync {
    type Client;

    fn client(&self) -> Self::Client;
}

impl<F, C> ClientProvider for F
where
    F: Fn() -> C + Send + Sync,
{
    type Client = C;

    fn client(&self) -> Self::Client {
        self()
    }
}

/// Supplies a database handle.
pub trait DatabaseProvider: Send + Sync {
    type Database: Database;

    fn database(&self) -> Self::Database;
}

impl<F, D> DatabaseProvider for F
where
    F: Fn() -> D + Send + Sync,
    D: Database,
{
    type Database = D;

    fn database(&self) -> Self::Database {
        self()
    }
}
