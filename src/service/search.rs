use std::sync::Arc;
use std::time::Duration;

use cyder_tools::log::warn;
use tokio::sync::watch;

use crate::database::prompt::PromptRepository;
use crate::schema::models::Prompt;
use crate::utils::debounce::Debouncer;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchResults {
    pub term: String,
    pub prompts: Vec<Prompt>,
}

/// Search-as-you-type over prompt titles. Only the last keystroke in a burst
/// reaches the backend.
pub struct LiveSearch {
    prompts: PromptRepository,
    debouncer: Debouncer,
    results: Arc<watch::Sender<SearchResults>>,
    limit: usize,
}

impl LiveSearch {
    pub fn new(prompts: PromptRepository, delay: Duration, limit: usize) -> Self {
        let (results, _) = watch::channel(SearchResults::default());
        Self {
            prompts,
            debouncer: Debouncer::new(delay),
            results: Arc::new(results),
            limit,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SearchResults> {
        self.results.subscribe()
    }

    pub fn on_input(&self, term: &str) {
        let term = term.trim().to_string();
        if term.is_empty() {
            self.debouncer.cancel();
            self.results.send_replace(SearchResults::default());
            return;
        }
        let prompts = self.prompts.clone();
        let results = self.results.clone();
        let limit = self.limit;
        self.debouncer.call(async move {
            match prompts.search(&term, limit).await {
                Ok(found) => {
                    results.send_replace(SearchResults { term, prompts: found });
                }
                Err(e) => warn!("search for {:?} failed: {}", term, e),
            }
        });
    }
}
