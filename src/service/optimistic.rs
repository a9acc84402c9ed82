use std::future::Future;

use cyder_tools::log::{error, warn};

use crate::error::BaseError;

/// Applies `mutate` to `state` right away, then awaits `commit`. When the
/// commit fails, `state` is replaced by whatever `refetch` returns, or by the
/// pre-mutation value if the refetch fails too. The commit error is returned
/// either way.
pub async fn run_optimistic<S, T, Commit, Refetch>(
    state: &mut S,
    mutate: impl FnOnce(&mut S),
    commit: Commit,
    refetch: Refetch,
) -> Result<T, BaseError>
where
    S: Clone,
    Commit: Future<Output = Result<T, BaseError>>,
    Refetch: Future<Output = Result<S, BaseError>>,
{
    let before = state.clone();
    mutate(state);
    match commit.await {
        Ok(value) => Ok(value),
        Err(commit_error) => {
            warn!("optimistic update rejected: {}", commit_error);
            match refetch.await {
                Ok(fresh) => *state = fresh,
                Err(refetch_error) => {
                    error!("refetch after rejected update failed: {}", refetch_error);
                    *state = before;
                }
            }
            Err(commit_error)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_success_keeps_local_mutation() {
        let mut likes = vec![("p1", 5)];
        let result = run_optimistic(
            &mut likes,
            |l| l[0].1 += 1,
            async { Ok::<_, BaseError>("ok") },
            async { Ok(Vec::new()) },
        )
        .await;
        assert_eq!(result.unwrap(), "ok");
        assert_eq!(likes, vec![("p1", 6)]);
    }

    #[tokio::test]
    async fn test_failure_replaces_state_with_refetch() {
        let mut likes = vec![("p1", 5)];
        let result: Result<(), _> = run_optimistic(
            &mut likes,
            |l| l[0].1 += 1,
            async { Err(BaseError::Backend(Some("offline".to_string()))) },
            async { Ok(vec![("p1", 7)]) },
        )
        .await;
        assert_eq!(result.unwrap_err(), BaseError::Backend(Some("offline".to_string())));
        assert_eq!(likes, vec![("p1", 7)]);
    }

    #[tokio::test]
    async fn test_failed_refetch_restores_previous_state() {
        let mut votes = 0.5_f64;
        let result: Result<(), _> = run_optimistic(
            &mut votes,
            |v| *v += 0.01,
            async { Err(BaseError::Backend(None)) },
            async { Err(BaseError::Backend(None)) },
        )
        .await;
        assert!(result.is_err());
        assert_eq!(votes, 0.5);
    }
}
