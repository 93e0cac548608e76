use std::collections::HashMap;
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use swarm_core::{SwarmEvent, TaskStatus};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

/// Progress bars driven by the swarm event stream.
pub struct ProgressMonitor {
    multi: MultiProgress,
    overall: ProgressBar,
    task_bars: HashMap<String, ProgressBar>,
}

impl ProgressMonitor {
    pub fn new() -> Self {
        Self::with_target(ProgressDrawTarget::stderr())
    }

    pub fn hidden() -> Self {
        Self::with_target(ProgressDrawTarget::hidden())
    }

    fn with_target(target: ProgressDrawTarget) -> Self {
        let multi = MultiProgress::with_draw_target(target);
        let overall = multi.add(ProgressBar::new(0));
        overall.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} tasks {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("█▓▒░  "),
        );
        overall.set_message("starting");
        Self {
            multi,
            overall,
            task_bars: HashMap::new(),
        }
    }

    pub fn resolved(&self) -> u64 {
        self.overall.position()
    }

    pub fn active_tasks(&self) -> usize {
        self.task_bars.len()
    }

    /// Returns `true` once the run has finished.
    pub fn handle(&mut self, event: &SwarmEvent) -> bool {
        match event {
            SwarmEvent::RunStarted {
                total_tasks, slots, ..
            } => {
                self.overall.set_length(*total_tasks as u64);
                self.overall.set_message(format!("{slots} slots"));
            }
            SwarmEvent::TaskDispatched {
                task_id,
                worker_id,
                attempt,
                ..
            } => {
                let bar = self.task_bar(task_id);
                bar.set_message(format!("{task_id} → {worker_id} (attempt {attempt})"));
            }
            SwarmEvent::TaskRetryScheduled {
                task_id,
                delay_ms,
                error,
                ..
            } => {
                let bar = self.task_bar(task_id);
                bar.set_message(format!("{task_id} retry in {delay_ms}ms: {error}"));
            }
            SwarmEvent::TaskResolved {
                task_id,
                status,
                attempts,
                ..
            } => {
                let icon = match status {
                    TaskStatus::Success => "✅",
                    TaskStatus::PermanentlyFailed => "❌",
                    TaskStatus::Skipped => "⏭",
                };
                let msg = format!("{icon} {task_id} ({attempts} attempts)");
                match self.task_bars.remove(task_id) {
                    Some(bar) => bar.finish_with_message(msg),
                    None => self.overall.println(msg),
                }
                self.overall.inc(1);
            }
            SwarmEvent::ScaleUpRequested { ratio, .. } => {
                self.overall.set_message(format!("scale up requested ({ratio:.2})"));
            }
            SwarmEvent::ScaleDownRequested { ratio, .. } => {
                self.overall
                    .set_message(format!("scale down requested ({ratio:.2})"));
            }
            SwarmEvent::CircuitOpened { worker_id, .. } => {
                self.overall.set_message(format!("circuit open: {worker_id}"));
            }
            SwarmEvent::CircuitClosed { worker_id, .. } => {
                self.overall.set_message(format!("circuit closed: {worker_id}"));
            }
            SwarmEvent::RunFinished {
                duration_ms,
                cancelled,
                ..
            } => {
                let msg = if *cancelled {
                    format!("cancelled after {duration_ms}ms")
                } else {
                    format!("done in {duration_ms}ms")
                };
                self.overall.finish_with_message(msg);
                return true;
            }
        }
        false
    }

    fn task_bar(&mut self, task_id: &str) -> &ProgressBar {
        let multi = &self.multi;
        self.task_bars.entry(task_id.to_string()).or_insert_with(|| {
            let bar = multi.add(ProgressBar::new_spinner());
            bar.set_style(
                ProgressStyle::default_spinner()
                    .template("  {spinner:.green} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner())
                    .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
            );
            bar.enable_steady_tick(Duration::from_millis(100));
            bar
        })
    }
}

impl Default for ProgressMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ProgressMonitor {
    fn drop(&mut self) {
        for (_, bar) in self.task_bars.drain() {
            bar.finish_and_clear();
        }
    }
}

/// Feed a monitor from `rx` until the run finishes or the bus closes.
pub fn spawn(mut rx: broadcast::Receiver<SwarmEvent>) -> JoinHandle<()> {
    let enabled = atty::is(atty::Stream::Stderr);
    tokio::spawn(async move {
        let mut monitor = if enabled {
            ProgressMonitor::new()
        } else {
            ProgressMonitor::hidden()
        };
        loop {
            match rx.recv().await {
                Ok(event) => {
                    if monitor.handle(&event) {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "progress monitor lagged behind the event bus");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn counts_resolved_tasks() {
        let mut monitor = ProgressMonitor::hidden();
        let run_id = "r".to_string();
        assert!(!monitor.handle(&SwarmEvent::RunStarted {
            run_id: run_id.clone(),
            total_tasks: 2,
            slots: 1,
            timestamp: Utc::now(),
        }));
        monitor.handle(&SwarmEvent::TaskDispatched {
            run_id: run_id.clone(),
            task_id: "a".into(),
            worker_id: "w1".into(),
            attempt: 1,
            timestamp: Utc::now(),
        });
        assert_eq!(monitor.active_tasks(), 1);

        monitor.handle(&SwarmEvent::TaskResolved {
            run_id: run_id.clone(),
            task_id: "a".into(),
            status: TaskStatus::Success,
            attempts: 1,
            timestamp: Utc::now(),
        });
        monitor.handle(&SwarmEvent::TaskResolved {
            run_id: run_id.clone(),
            task_id: "b".into(),
            status: TaskStatus::Skipped,
            attempts: 0,
            timestamp: Utc::now(),
        });
        assert_eq!(monitor.resolved(), 2);
        assert_eq!(monitor.active_tasks(), 0);

        assert!(monitor.handle(&SwarmEvent::RunFinished {
            run_id,
            duration_ms: 5,
            cancelled: false,
            timestamp: Utc::now(),
        }));
    }

    #[tokio::test]
    async fn spawned_monitor_stops_when_bus_closes() {
        let bus = swarm_core::EventBus::new(8);
        let handle = spawn(bus.subscribe());
        drop(bus);
        handle.await.unwrap();
    }
}
