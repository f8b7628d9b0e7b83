use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

/// One async mutex per student id.
///
/// Holding the guard keeps every other write for that student waiting;
/// writes for other students are unaffected.
#[derive(Default)]
pub struct StudentLocks {
    slots: Mutex<HashMap<Uuid, Arc<AsyncMutex<()>>>>,
}

pub type StudentGuard = OwnedMutexGuard<()>;

impl StudentLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, student_id: Uuid) -> StudentGuard {
        let slot = {
            // A poisoned map only means another thread panicked while inserting
            let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
            // Drop slots nobody is holding or waiting on
            if slots.len() > 1024 {
                slots.retain(|_, slot| Arc::strong_count(slot) > 1);
            }
            slots.entry(student_id).or_default().clone()
        };
        slot.lock_owned().await
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.slots.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}
