//! Connection handle slot shared by all adapters.
//!
//! Lifecycle: empty -> installed by `connect` -> taken by `close` -> empty.
//! Nothing but `connect`/`close` installs or removes the handle.

use crate::error::{DbError, DbResult};
use crate::models::DatabaseType;
use tokio::sync::RwLock;

#[derive(Debug)]
pub struct AdapterHandle<T> {
    dialect: DatabaseType,
    slot: RwLock<Option<T>>,
}

impl<T: Clone> AdapterHandle<T> {
    /// Create an empty handle for a dialect.
    pub fn new(dialect: DatabaseType) -> Self {
        Self {
            dialect,
            slot: RwLock::new(None),
        }
    }

    /// Clone the live handle out, or fail with `NotConnected`.
    ///
    /// Handles are cheap reference-counted clones (pools, `Arc`s), so the lock
    /// is never held across the caller's I/O.
    pub async fn get(&self) -> DbResult<T> {
        self.slot
            .read()
            .await
            .clone()
            .ok_or_else(|| DbError::not_connected(self.dialect))
    }

    pub async fn is_connected(&self) -> bool {
        self.slot.read().await.is_some()
    }

    /// Install a freshly verified handle, returning any handle it displaced.
    pub async fn install(&self, handle: T) -> Option<T> {
        self.slot.write().await.replace(handle)
    }

    /// Remove the handle, leaving the slot empty.
    pub async fn take(&self) -> Option<T> {
        self.slot.write().await.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_handle_is_not_connected() {
        let handle: AdapterHandle<u8> = AdapterHandle::new(DatabaseType::Oracle);
        assert!(!handle.is_connected().await);
        assert!(matches!(
            handle.get().await,
            Err(DbError::NotConnected {
                dialect: DatabaseType::Oracle
            })
        ));
    }

    #[tokio::test]
    async fn test_install_and_take() {
        let handle = AdapterHandle::new(DatabaseType::SQLite);
        assert_eq!(handle.install(1u8).await, None);
        assert_eq!(handle.get().await.unwrap(), 1);
        assert_eq!(handle.install(2u8).await, Some(1));
        assert_eq!(handle.take().await, Some(2));
        assert_eq!(handle.take().await, None);
        assert!(!handle.is_connected().await);
    }
}
