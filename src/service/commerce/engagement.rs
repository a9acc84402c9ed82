use cyder_tools::log::{debug, warn};

use crate::database::procedure::Procedures;
use crate::database::prompt::PromptRepository;
use crate::database::rate_me::RateMeRepository;
use crate::error::BaseError;
use crate::schema::models::{Prompt, RateMeEntry};
use crate::service::optimistic::run_optimistic;
use crate::service::prefs::likes::{LikeToggle, LikeTracker};

/// Rate Me leaderboard as shown on the page: voting bumps the local score
/// immediately and reconciles with a reload if the vote is refused.
pub struct Leaderboard {
    entries: RateMeRepository,
    procedures: Procedures,
    vote_step: f64,
    limit: usize,
}

impl Leaderboard {
    pub fn new(entries: RateMeRepository, procedures: Procedures, vote_step: f64, limit: usize) -> Self {
        Self { entries, procedures, vote_step, limit }
    }

    pub async fn load(&self) -> Result<Vec<RateMeEntry>, BaseError> {
        self.entries.leaderboard(self.limit).await
    }

    pub async fn vote(
        &self,
        shown: &mut Vec<RateMeEntry>,
        entry_id: &str,
        voter: Option<&str>,
    ) -> Result<(), BaseError> {
        if !shown.iter().any(|e| e.id == entry_id) {
            return Err(BaseError::NotFound(Some(format!("entry {} not found", entry_id))));
        }
        let step = self.vote_step;
        run_optimistic(
            shown,
            |entries| {
                if let Some(entry) = entries.iter_mut().find(|e| e.id == entry_id) {
                    entry.votes += step;
                }
            },
            async {
                self.procedures.vote_rate_me(entry_id, voter).await?;
                debug!("vote recorded for {}", entry_id);
                Ok::<(), BaseError>(())
            },
            self.load(),
        )
        .await
    }
}

/// Likes on prompt cards. The liked set lives on this device; the counter is remote.
pub struct Likes {
    tracker: LikeTracker,
    procedures: Procedures,
    prompts: PromptRepository,
}

impl Likes {
    pub fn new(tracker: LikeTracker, procedures: Procedures, prompts: PromptRepository) -> Self {
        Self { tracker, procedures, prompts }
    }

    pub fn is_liked(&self, prompt_id: &str) -> Result<bool, BaseError> {
        Ok(self.tracker.is_liked(prompt_id)?)
    }

    pub async fn toggle(&self, prompt: &mut Prompt) -> Result<LikeToggle, BaseError> {
        let was_liked = self.tracker.is_liked(&prompt.id)?;
        let toggle = self.tracker.toggle_like(&prompt.id, prompt.likes, was_liked)?;
        let delta = if toggle.new_is_liked { 1 } else { -1 };
        let id = prompt.id.clone();

        let result = run_optimistic(
            prompt,
            |p| p.likes = toggle.new_likes_count,
            self.procedures.increment_prompt_likes(&id, delta),
            self.prompts.get(&id),
        )
        .await;

        if let Err(e) = result {
            // Put the device-side like state back the way it was.
            if let Err(revert) = self.tracker.toggle_like(&id, prompt.likes, toggle.new_is_liked) {
                warn!("could not revert local like for {}: {}", id, revert);
            }
            return Err(e);
        }
        Ok(toggle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::memory::MemoryStore;
    use crate::service::prefs::MemoryKv;
    use serde_json::json;
    use std::sync::Arc;

    fn leaderboard(store: Arc<MemoryStore>) -> Leaderboard {
        Leaderboard::new(RateMeRepository::new(store.clone()), Procedures::new(store), 0.01, 10)
    }

    #[tokio::test]
    async fn test_vote_bumps_locally_then_commits() {
        let store = Arc::new(MemoryStore::new());
        store.seed("rate_me_entries", vec![json!({"id": "e1", "image_url": "u", "final_score": 8.1, "votes": 0.1})]);
        store.on_rpc("vote_rate_me_entry", |_| Ok(json!({"success": true})));
        let board = leaderboard(store.clone());

        let mut shown = board.load().await.unwrap();
        board.vote(&mut shown, "e1", Some("u1")).await.unwrap();
        assert!((shown[0].votes - 0.11).abs() < 1e-9);
        assert!(board.vote(&mut shown, "missing", None).await.is_err());
    }

    #[tokio::test]
    async fn test_refused_vote_reloads_board() {
        let store = Arc::new(MemoryStore::new());
        store.seed("rate_me_entries", vec![json!({"id": "e1", "image_url": "u", "final_score": 8.1, "votes": 0.5})]);
        store.on_rpc("vote_rate_me_entry", |_| {
            Ok(json!({"success": false, "message": "Already voted today"}))
        });
        let board = leaderboard(store.clone());

        let mut shown = board.load().await.unwrap();
        let err = board.vote(&mut shown, "e1", Some("u1")).await.unwrap_err();
        assert_eq!(err.user_message(), "Already voted today");
        assert_eq!(shown[0].votes, 0.5);
    }

    fn likes(store: Arc<MemoryStore>) -> Likes {
        Likes::new(
            LikeTracker::new(Arc::new(MemoryKv::new())),
            Procedures::new(store.clone()),
            PromptRepository::new(store),
        )
    }

    #[tokio::test]
    async fn test_like_toggle_round_trip() {
        let store = Arc::new(MemoryStore::new());
        store.on_rpc("increment_prompt_likes", |_| Ok(json!(null)));
        let likes = likes(store.clone());
        let mut prompt: Prompt = serde_json::from_value(json!({"id": "p1", "title": "t", "likes": 5})).unwrap();

        let liked = likes.toggle(&mut prompt).await.unwrap();
        assert_eq!(liked, LikeToggle { new_likes_count: 6, new_is_liked: true });
        assert_eq!(prompt.likes, 6);

        let unliked = likes.toggle(&mut prompt).await.unwrap();
        assert!(!unliked.new_is_liked);
        assert_eq!(prompt.likes, 5);
        let deltas: Vec<_> = store.rpc_calls().iter().map(|(_, p)| p["p_delta"].clone()).collect();
        assert_eq!(deltas, vec![json!(1), json!(-1)]);
    }

    #[tokio::test]
    async fn test_failed_like_restores_remote_count_and_local_flag() {
        let store = Arc::new(MemoryStore::new());
        store.seed("prompts", vec![json!({"id": "p1", "title": "t", "likes": 9})]);
        store.on_rpc("increment_prompt_likes", |_| Err(BaseError::Backend(Some("offline".to_string()))));
        let likes = likes(store);
        let mut prompt: Prompt = serde_json::from_value(json!({"id": "p1", "title": "t", "likes": 5})).unwrap();

        assert!(likes.toggle(&mut prompt).await.is_err());
        assert_eq!(prompt.likes, 9);
        assert!(!likes.is_liked("p1").unwrap());
    }
}
