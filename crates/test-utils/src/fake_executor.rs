use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use buildpipe::engine::{RuntimeEvent, StageOutcome};
use buildpipe::errors::Result;
use buildpipe::exec::ExecutorBackend;
use buildpipe::pipeline::ScheduledStage;

/// A fake executor that:
/// - records which stages were "run"
/// - immediately reports `StageCompleted` for each dispatched stage,
///   succeeding unless the stage name is in the failing set.
pub struct FakeExecutor {
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    executed: Arc<Mutex<Vec<String>>>,
    failing: HashSet<String>,
}

impl FakeExecutor {
    pub fn new(
        runtime_tx: mpsc::Sender<RuntimeEvent>,
        executed: Arc<Mutex<Vec<String>>>,
    ) -> Self {
        Self {
            runtime_tx,
            executed,
            failing: HashSet::new(),
        }
    }

    /// Mark stages that should report failure instead of success.
    pub fn with_failing(mut self, stages: &[&str]) -> Self {
        self.failing = stages.iter().map(|s| s.to_string()).collect();
        self
    }
}

impl ExecutorBackend for FakeExecutor {
    fn spawn_ready_stages(
        &mut self,
        stages: Vec<ScheduledStage>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let tx = self.runtime_tx.clone();
        let executed = Arc::clone(&self.executed);
        let failing = self.failing.clone();

        Box::pin(async move {
            for s in stages {
                {
                    let mut guard = executed.lock().unwrap();
                    guard.push(s.name.clone());
                }

                let outcome = if failing.contains(&s.name) {
                    StageOutcome::Failed(format!("stage '{}' failed (fake)", s.name))
                } else {
                    StageOutcome::Success
                };

                tx.send(RuntimeEvent::StageCompleted {
                    stage: s.name.clone(),
                    outcome,
                })
                .await
                .map_err(anyhow::Error::from)?;
            }
            Ok(())
        })
    }

    fn drain(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async { Ok(()) })
    }
}
