//! Background source tasks (header and event subscriptions)

use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;

/// How often a waiter re-checks whether the sources are still running
const POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, Default)]
pub struct SourceSet {
    tasks: Vec<JoinHandle<()>>,
}

impl SourceSet {
    pub fn spawn<F>(&mut self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tasks.push(tokio::spawn(fut));
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// True once every spawned source has returned; false for an empty set
    pub fn all_stopped(&self) -> bool {
        !self.tasks.is_empty() && self.tasks.iter().all(|t| t.is_finished())
    }

    /// Resolves when every source has returned
    pub async fn stopped(&self) {
        while !self.all_stopped() {
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Wait up to `grace` for the sources to finish, then abort the rest
    pub async fn shutdown(mut self, grace: Duration) {
        let drained = tokio::time::timeout(
            grace,
            futures::future::join_all(self.tasks.iter_mut()),
        )
        .await;
        if drained.is_err() {
            log::warn!("sources did not stop in time; aborting");
        }
        for task in &self.tasks {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn stopped_only_after_every_source_returns() {
        let mut set = SourceSet::default();
        assert!(!set.all_stopped());

        let (release, wait) = oneshot::channel::<()>();
        set.spawn(async {});
        set.spawn(async move {
            let _ = wait.await;
        });
        assert_eq!(set.len(), 2);
        tokio::task::yield_now().await;
        assert!(!set.all_stopped());

        release.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(2), set.stopped())
            .await
            .expect("sources should report stopped");
        assert!(set.all_stopped());
    }

    #[tokio::test]
    async fn shutdown_aborts_sources_that_ignore_it() {
        let mut set = SourceSet::default();
        set.spawn(std::future::pending::<()>());
        tokio::time::timeout(Duration::from_secs(2), set.shutdown(Duration::from_millis(20)))
            .await
            .expect("shutdown should not hang");
    }
}
