use std::sync::Arc;

use super::{get_json, set_json, KeyValueStore, KvError};

const LIKED_PROMPTS: &str = "liked_prompts";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LikeToggle {
    pub new_likes_count: i64,
    pub new_is_liked: bool,
}

/// Remembers which prompts this device liked.
#[derive(Clone)]
pub struct LikeTracker {
    kv: Arc<dyn KeyValueStore>,
}

impl LikeTracker {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    pub fn liked_ids(&self) -> Result<Vec<String>, KvError> {
        Ok(get_json(self.kv.as_ref(), LIKED_PROMPTS)?.unwrap_or_default())
    }

    pub fn is_liked(&self, id: &str) -> Result<bool, KvError> {
        Ok(self.liked_ids()?.iter().any(|liked| liked == id))
    }

    /// Flips the like state shown to the user, given the count and state currently displayed.
    pub fn toggle_like(&self, id: &str, likes: i64, is_liked: bool) -> Result<LikeToggle, KvError> {
        let mut ids = self.liked_ids()?;
        ids.retain(|liked| liked != id);
        let toggle = if is_liked {
            LikeToggle { new_likes_count: (likes - 1).max(0), new_is_liked: false }
        } else {
            ids.push(id.to_string());
            LikeToggle { new_likes_count: likes.max(0) + 1, new_is_liked: true }
        };
        set_json(self.kv.as_ref(), LIKED_PROMPTS, &ids)?;
        Ok(toggle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::prefs::MemoryKv;

    #[test]
    fn test_toggle_twice_restores_state() {
        let tracker = LikeTracker::new(Arc::new(MemoryKv::new()));

        let liked = tracker.toggle_like("p1", 5, false).unwrap();
        assert_eq!(liked, LikeToggle { new_likes_count: 6, new_is_liked: true });
        assert!(tracker.is_liked("p1").unwrap());

        let unliked = tracker.toggle_like("p1", 6, true).unwrap();
        assert_eq!(unliked, LikeToggle { new_likes_count: 5, new_is_liked: false });
        assert!(!tracker.is_liked("p1").unwrap());
    }

    #[test]
    fn test_no_duplicates_and_no_negative_counts() {
        let tracker = LikeTracker::new(Arc::new(MemoryKv::new()));
        tracker.toggle_like("p1", 0, false).unwrap();
        tracker.toggle_like("p1", 1, false).unwrap();
        tracker.toggle_like("p2", 3, false).unwrap();
        assert_eq!(tracker.liked_ids().unwrap(), vec!["p1", "p2"]);

        let toggle = tracker.toggle_like("p3", 0, true).unwrap();
        assert_eq!(toggle.new_likes_count, 0);
    }
}
