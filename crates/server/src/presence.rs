use std::collections::{HashMap, HashSet};

use tokio::sync::RwLock;

/// Per-user online device set. A user is in the online set iff their device
/// set is non-empty; both sides of that invariant change under one write
/// guard, so observers never see them disagree.
pub struct PresenceStore {
    devices: RwLock<HashMap<String, HashSet<String>>>,
}

impl Default for PresenceStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PresenceStore {
    pub fn new() -> Self {
        Self {
            devices: RwLock::new(HashMap::new()),
        }
    }

    pub async fn set_online(&self, user_id: &str, device_id: &str) {
        self.devices
            .write()
            .await
            .entry(user_id.to_string())
            .or_default()
            .insert(device_id.to_string());
    }

    /// Returns true when this transition took the user fully offline.
    pub async fn set_offline(&self, user_id: &str, device_id: &str) -> bool {
        let mut devices = self.devices.write().await;
        if let Some(set) = devices.get_mut(user_id) {
            set.remove(device_id);
            if set.is_empty() {
                devices.remove(user_id);
                return true;
            }
        }
        false
    }

    pub async fn is_online(&self, user_id: &str) -> bool {
        self.devices.read().await.contains_key(user_id)
    }

    pub async fn devices(&self, user_id: &str) -> HashSet<String> {
        self.devices
            .read()
            .await
            .get(user_id)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn online_users(&self) -> Vec<String> {
        self.devices.read().await.keys().cloned().collect()
    }
}
