use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Per-room mutual exclusion for power-level read-modify-write.
///
/// The homeserver only accepts whole-document writes, so two unsynchronized
/// updates to the same room lose one of them. Every read-modify-write holds
/// the room's guard from read to write. Entries nobody holds are pruned on
/// the next acquisition.
#[derive(Default)]
pub struct RoomLocks {
    rooms: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl RoomLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, room_id: &str) -> OwnedMutexGuard<()> {
        let slot = {
            let mut rooms = self.rooms.lock().unwrap_or_else(|e| e.into_inner());
            rooms.retain(|id, m| id == room_id || Arc::strong_count(m) > 1);
            Arc::clone(rooms.entry(room_id.to_string()).or_default())
        };
        slot.lock_owned().await
    }

    /// Number of rooms currently tracked.
    pub fn tracked(&self) -> usize {
        self.rooms.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn same_room_is_exclusive() {
        let locks = Arc::new(RoomLocks::new());
        let g = locks.lock("!a").await;

        let l2 = Arc::clone(&locks);
        let waiter = tokio::spawn(async move {
            let _g = l2.lock("!a").await;
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished(), "second holder must wait");

        drop(g);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn different_rooms_do_not_block() {
        let locks = RoomLocks::new();
        let _a = locks.lock("!a").await;
        let b = tokio::time::timeout(Duration::from_millis(100), locks.lock("!b")).await;
        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn released_entries_are_pruned() {
        let locks = RoomLocks::new();
        drop(locks.lock("!a").await);
        drop(locks.lock("!b").await);
        let _c = locks.lock("!c").await;
        assert_eq!(locks.tracked(), 1);
    }
}
