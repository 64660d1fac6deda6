//! Per-entity exclusivity for circulation requests.
//!
//! Every book and user gets its own async mutex, created on first use and
//! dropped from the registry again once no request holds or waits on it.
//! A request names all the entities it touches up front; the registry sorts
//! the keys (books before users, then by id) so two requests can never wait
//! on each other in opposite order.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::Instant;

use crate::domain::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LockKey {
    Book(i32),
    User(i32),
}

type LockMap = DashMap<LockKey, Arc<Mutex<()>>>;

/// Guards held for the duration of one unit of work. Dropping releases them.
#[derive(Debug)]
pub struct LockSet {
    guards: Vec<(LockKey, OwnedMutexGuard<()>)>,
    locks: Arc<LockMap>,
}

impl Drop for LockSet {
    fn drop(&mut self) {
        for (key, guard) in self.guards.drain(..) {
            drop(guard);
            // The map's own Arc is the last one: nobody holds or awaits this key.
            // Cloning happens under the same shard lock, so this cannot race.
            self.locks
                .remove_if(&key, |_, mutex| Arc::strong_count(mutex) == 1);
        }
    }
}

#[derive(Debug)]
pub struct LockRegistry {
    locks: Arc<LockMap>,
    timeout: Duration,
}

impl LockRegistry {
    pub fn new(timeout: Duration) -> Self {
        Self {
            locks: Arc::new(DashMap::new()),
            timeout,
        }
    }

    /// Acquire every key in global order, failing with `Busy` once the
    /// combined wait exceeds the registry timeout.
    pub async fn acquire(&self, keys: &[LockKey]) -> Result<LockSet, DomainError> {
        let mut keys = keys.to_vec();
        keys.sort();
        keys.dedup();

        let deadline = Instant::now() + self.timeout;
        let mut set = LockSet {
            guards: Vec::with_capacity(keys.len()),
            locks: Arc::clone(&self.locks),
        };

        for key in keys {
            // Clone the Arc so the map shard is not held across the await
            let mutex = self.locks.entry(key).or_default().clone();

            match tokio::time::timeout_at(deadline, mutex.lock_owned()).await {
                Ok(guard) => set.guards.push((key, guard)),
                Err(_) => {
                    tracing::warn!("Timed out after {:?} waiting for {:?}", self.timeout, key);
                    return Err(DomainError::Busy(format!("{:?} is locked", key)));
                }
            }
        }

        Ok(set)
    }

    /// Number of keys currently held or awaited.
    pub fn tracked(&self) -> usize {
        self.locks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn books_order_before_users() {
        let mut keys = vec![LockKey::User(1), LockKey::Book(9), LockKey::Book(2)];
        keys.sort();
        assert_eq!(
            keys,
            vec![LockKey::Book(2), LockKey::Book(9), LockKey::User(1)]
        );
    }

    #[tokio::test]
    async fn held_lock_times_out_as_busy() {
        let registry = LockRegistry::new(Duration::from_millis(20));
        let _held = registry.acquire(&[LockKey::User(1)]).await.unwrap();

        let err = registry
            .acquire(&[LockKey::Book(1), LockKey::User(1)])
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Busy(_)));

        // The book lock taken before the timeout was released again
        let book = registry.acquire(&[LockKey::Book(1)]).await;
        assert!(book.is_ok());
    }

    #[tokio::test]
    async fn released_on_drop() {
        let registry = LockRegistry::new(Duration::from_millis(20));
        {
            let _set = registry.acquire(&[LockKey::Book(7)]).await.unwrap();
        }
        assert!(registry.acquire(&[LockKey::Book(7)]).await.is_ok());
    }

    #[tokio::test]
    async fn idle_keys_are_pruned() {
        let registry = LockRegistry::new(Duration::from_millis(20));

        let set = registry
            .acquire(&[LockKey::Book(1), LockKey::User(1)])
            .await
            .unwrap();
        assert_eq!(registry.tracked(), 2);
        drop(set);
        assert_eq!(registry.tracked(), 0);

        // A timed-out request leaves only the holder's key behind
        let held = registry.acquire(&[LockKey::User(2)]).await.unwrap();
        assert!(
            registry
                .acquire(&[LockKey::Book(2), LockKey::User(2)])
                .await
                .is_err()
        );
        assert_eq!(registry.tracked(), 1);
        drop(held);
        assert_eq!(registry.tracked(), 0);
    }

    #[tokio::test]
    async fn waiter_keeps_key_alive_across_release() {
        let registry = Arc::new(LockRegistry::new(Duration::from_millis(500)));
        let held = registry.acquire(&[LockKey::Book(5)]).await.unwrap();

        let waiter = {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move { registry.acquire(&[LockKey::Book(5)]).await.map(|_| ()) })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        drop(held);

        assert!(waiter.await.unwrap().is_ok());
        assert_eq!(registry.tracked(), 0);
    }

    #[tokio::test]
    async fn duplicate_keys_do_not_self_deadlock() {
        let registry = LockRegistry::new(Duration::from_millis(20));
        let set = registry
            .acquire(&[LockKey::Book(3), LockKey::Book(3)])
            .await;
        assert!(set.is_ok());
    }
}
