// tests/watch_serialization.rs

//! Per-stage run serialization: rapid triggers against an in-flight stage
//! collapse into exactly one queued follow-up run.

use std::error::Error;

use buildpipe::engine::{CoreRuntime, RuntimeEvent, RuntimeOptions, StageOutcome, TriggerReason};
use buildpipe::pipeline::{ScheduledStage, Scheduler};
use buildpipe_test_utils::builders::{ConfigFileBuilder, StageConfigBuilder};
use buildpipe_test_utils::{init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

fn styles_only() -> buildpipe::config::ConfigFile {
    ConfigFileBuilder::new()
        .with_stage(
            "styles",
            StageConfigBuilder::new("source/styles/**/*.style", "app/css").build(),
        )
        .build()
}

fn trigger(stage: &str) -> RuntimeEvent {
    RuntimeEvent::StageTriggered {
        stage: stage.to_string(),
        reason: TriggerReason::FileChange,
    }
}

fn dispatched(core: &mut CoreRuntime, event: RuntimeEvent) -> Vec<ScheduledStage> {
    let step = core.step(event);
    step.commands
        .into_iter()
        .filter_map(|c| match c {
            buildpipe::engine::CoreCommand::DispatchStages(s) => Some(s),
            _ => None,
        })
        .flatten()
        .collect()
}

#[tokio::test]
async fn n_triggers_while_running_yield_exactly_one_rerun() -> TestResult {
    with_timeout(async {
        init_tracing();

        let cfg = styles_only();
        let mut core = CoreRuntime::new(
            Scheduler::from_config(&cfg),
            1,
            RuntimeOptions {
                exit_when_idle: false,
                reload_on_success: false,
            },
        );

        // First change dispatches the stage.
        let first = dispatched(&mut core, trigger("styles"));
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].name, "styles");

        // Editing a.style then b.style (and saving again) while the stage is
        // mid-run: all three re-triggers land in the queue.
        for _ in 0..3 {
            let mid_run = dispatched(&mut core, trigger("styles"));
            assert!(mid_run.is_empty());
        }
        assert!(!core.queue_is_empty());

        // Completing the in-flight run starts exactly one follow-up run.
        let rerun = dispatched(
            &mut core,
            RuntimeEvent::StageCompleted {
                stage: "styles".to_string(),
                outcome: StageOutcome::Success,
            },
        );
        assert_eq!(rerun.len(), 1);
        assert_eq!(rerun[0].name, "styles");
        assert!(core.queue_is_empty());
        assert!(!core.is_idle());

        // And the follow-up run completes without spawning a third.
        let after = dispatched(
            &mut core,
            RuntimeEvent::StageCompleted {
                stage: "styles".to_string(),
                outcome: StageOutcome::Success,
            },
        );
        assert!(after.is_empty());
        assert!(core.is_idle());

        Ok(())
    })
    .await
}

#[tokio::test]
async fn trigger_for_pending_stage_is_not_queued() -> TestResult {
    with_timeout(async {
        init_tracing();

        // bundle waits on styles; a change to bundle's inputs while it is
        // still Pending must not queue a redundant second run.
        let cfg = ConfigFileBuilder::new()
            .with_stage(
                "styles",
                StageConfigBuilder::new("source/styles/**/*.style", "app/css").build(),
            )
            .with_stage(
                "bundle",
                StageConfigBuilder::new("app/*.html", "dist")
                    .depends_on("styles")
                    .build(),
            )
            .build();

        let mut core = CoreRuntime::new(
            Scheduler::from_config(&cfg),
            1,
            RuntimeOptions {
                exit_when_idle: false,
                reload_on_success: false,
            },
        );

        let first = dispatched(&mut core, trigger("styles"));
        assert_eq!(first.len(), 1);

        let mid = dispatched(&mut core, trigger("bundle"));
        assert!(mid.is_empty());
        assert!(core.queue_is_empty());

        let second = dispatched(
            &mut core,
            RuntimeEvent::StageCompleted {
                stage: "styles".to_string(),
                outcome: StageOutcome::Success,
            },
        );
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].name, "bundle");

        dispatched(
            &mut core,
            RuntimeEvent::StageCompleted {
                stage: "bundle".to_string(),
                outcome: StageOutcome::Success,
            },
        );
        assert!(core.is_idle());
        assert!(core.queue_is_empty());

        Ok(())
    })
    .await
}

#[tokio::test]
async fn failure_in_watch_mode_keeps_the_core_alive() -> TestResult {
    with_timeout(async {
        init_tracing();

        let cfg = styles_only();
        let mut core = CoreRuntime::new(
            Scheduler::from_config(&cfg),
            1,
            RuntimeOptions {
                exit_when_idle: false,
                reload_on_success: false,
            },
        );

        dispatched(&mut core, trigger("styles"));
        let step = core.step(RuntimeEvent::StageCompleted {
            stage: "styles".to_string(),
            outcome: StageOutcome::Failed("syntax error".to_string()),
        });
        assert!(step.keep_running);
        assert!(core.is_idle());

        // The next change triggers a fresh run.
        let again = dispatched(&mut core, trigger("styles"));
        assert_eq!(again.len(), 1);

        Ok(())
    })
    .await
}
