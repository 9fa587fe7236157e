// Copyright (c) 2026 Bitmesh
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Task scheduler (spec §9 design note): named long-lived background tasks
//! replacing the source's mix of timer threads, a global dispatch queue,
//! and ad-hoc detached tasks. Re-spawning a name aborts the previous task
//! under that name; `shutdown` tears down everything at once.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;

use tokio::task::JoinHandle;

/// Canonical names for the tasks named in spec §9.
pub mod task_names {
    /// Periodic `REQUEST_SYNC` emission (spec §4.3).
    pub const GOSSIP_TIMER: &str = "gossip-timer";
    /// Proxy bootstrap-phase polling (spec §4.5.1).
    pub const BOOTSTRAP_POLLER: &str = "bootstrap-poller";
    /// Proxy control-channel foreground/health monitor (spec §4.5.1).
    pub const CONTROL_MONITOR: &str = "control-monitor";
    /// Periodic outbox flush sweep (spec §4.7).
    pub const OUTBOX_FLUSHER: &str = "outbox-flusher";
    /// Mesh event dispatch loop that schedules per-peer syncs (spec §4.3).
    pub const PEER_SYNC_DISPATCH: &str = "peer-sync-dispatch";
}

/// Owns a set of named background tasks and cancels them on teardown.
/// PoW mining is deliberately never registered here (spec §9: it must not
/// hold a scheduler slot exclusively; it yields cooperatively instead).
#[derive(Default)]
pub struct TaskScheduler {
    tasks: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl TaskScheduler {
    /// Build an empty scheduler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn `fut` under `name`, aborting and replacing any task already
    /// running under that name.
    pub fn spawn_named<F>(&self, name: &str, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(fut);
        let mut tasks = self.tasks.lock().expect("scheduler mutex poisoned");
        if let Some(old) = tasks.insert(name.to_string(), handle) {
            old.abort();
        }
    }

    /// Abort the task registered under `name`, if any. Returns whether one
    /// was found.
    pub fn abort(&self, name: &str) -> bool {
        let mut tasks = self.tasks.lock().expect("scheduler mutex poisoned");
        match tasks.remove(name) {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    /// Whether a task is registered under `name` and has not finished.
    pub fn is_running(&self, name: &str) -> bool {
        let tasks = self.tasks.lock().expect("scheduler mutex poisoned");
        tasks.get(name).map(|h| !h.is_finished()).unwrap_or(false)
    }

    /// Abort every registered task.
    pub fn shutdown(&self) {
        let mut tasks = self.tasks.lock().expect("scheduler mutex poisoned");
        for (_, handle) in tasks.drain() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn spawn_named_replaces_prior_task() {
        let scheduler = TaskScheduler::new();
        let runs = Arc::new(AtomicUsize::new(0));

        let r1 = runs.clone();
        scheduler.spawn_named(task_names::GOSSIP_TIMER, async move {
            tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
            r1.fetch_add(1, Ordering::SeqCst);
        });
        assert!(scheduler.is_running(task_names::GOSSIP_TIMER));

        let r2 = runs.clone();
        scheduler.spawn_named(task_names::GOSSIP_TIMER, async move {
            r2.fetch_add(1, Ordering::SeqCst);
        });

        tokio::task::yield_now().await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn shutdown_aborts_all_tasks() {
        let scheduler = TaskScheduler::new();
        scheduler.spawn_named(task_names::OUTBOX_FLUSHER, async {
            tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
        });
        scheduler.spawn_named(task_names::BOOTSTRAP_POLLER, async {
            tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
        });
        scheduler.shutdown();
        assert!(!scheduler.is_running(task_names::OUTBOX_FLUSHER));
        assert!(!scheduler.is_running(task_names::BOOTSTRAP_POLLER));
    }

    #[tokio::test]
    async fn abort_missing_task_returns_false() {
        let scheduler = TaskScheduler::new();
        assert!(!scheduler.abort(task_names::CONTROL_MONITOR));
    }
}
