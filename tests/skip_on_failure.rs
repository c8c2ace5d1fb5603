// tests/skip_on_failure.rs

//! Dependency-failure propagation: dependents of a failed stage are skipped,
//! never run, and siblings keep running.

use std::error::Error;
use std::sync::{Arc, Mutex};

use buildpipe::engine::{
    CoreRuntime, Runtime, RuntimeEvent, RuntimeOptions, StageOutcome, TriggerReason,
};
use buildpipe::pipeline::{PipelineRun, Scheduler, StageRunState, StageStatus};
use buildpipe::reload::NullNotifier;
use buildpipe_test_utils::builders::{ConfigFileBuilder, StageConfigBuilder};
use buildpipe_test_utils::fake_executor::FakeExecutor;
use buildpipe_test_utils::{init_tracing, with_timeout};
use tokio::sync::mpsc;

type TestResult = Result<(), Box<dyn Error>>;

fn diamond() -> buildpipe::config::ConfigFile {
    // images and fonts are independent; bundle needs images.
    ConfigFileBuilder::new()
        .with_stage(
            "images",
            StageConfigBuilder::new("app/images/**/*.png", "dist/images").build(),
        )
        .with_stage(
            "fonts",
            StageConfigBuilder::new("app/fonts/**/*", "dist/fonts").build(),
        )
        .with_stage(
            "bundle",
            StageConfigBuilder::new("app/*.html", "dist")
                .depends_on("images")
                .build(),
        )
        .build()
}

#[tokio::test]
async fn failed_stage_skips_dependents_without_running_them() -> TestResult {
    with_timeout(async {
        init_tracing();

        let mut scheduler = Scheduler::from_config(&diamond());

        scheduler.start_new_run();
        scheduler.handle_trigger("images");
        scheduler.handle_trigger("fonts");

        let step =
            scheduler.step_completion("images", StageOutcome::Failed("boom".to_string()));
        assert_eq!(step.newly_skipped, vec!["bundle".to_string()]);
        assert!(step.newly_scheduled.is_empty());
        assert_eq!(
            scheduler.run_state_of("bundle"),
            Some(StageRunState::Skipped)
        );

        // The sibling is unaffected and finishes the run.
        let step = scheduler.step_completion("fonts", StageOutcome::Success);
        let run = step.finished_run.expect("run should finish");

        assert_eq!(
            run.statuses.get("images"),
            Some(&StageStatus::Failed {
                cause: "boom".to_string()
            })
        );
        assert_eq!(
            run.statuses.get("bundle"),
            Some(&StageStatus::Skipped {
                cause: "dependency 'images' failed".to_string()
            })
        );
        assert_eq!(run.statuses.get("fonts"), Some(&StageStatus::Success));

        // bundle was never dispatched.
        assert_eq!(run.stages_executed, vec!["images", "fonts"]);

        Ok(())
    })
    .await
}

#[tokio::test]
async fn skip_propagates_transitively() -> TestResult {
    with_timeout(async {
        init_tracing();

        let cfg = ConfigFileBuilder::new()
            .with_stage(
                "a",
                StageConfigBuilder::new("src/a/**/*", "out/a").build(),
            )
            .with_stage(
                "b",
                StageConfigBuilder::new("src/b/**/*", "out/b")
                    .depends_on("a")
                    .build(),
            )
            .with_stage(
                "c",
                StageConfigBuilder::new("src/c/**/*", "out/c")
                    .depends_on("b")
                    .build(),
            )
            .build();

        let mut scheduler = Scheduler::from_config(&cfg);
        scheduler.start_new_run();
        scheduler.handle_trigger("a");

        let step = scheduler.step_completion("a", StageOutcome::Failed("no disk".to_string()));
        let mut skipped = step.newly_skipped.clone();
        skipped.sort();
        assert_eq!(skipped, vec!["b".to_string(), "c".to_string()]);

        let run = step.finished_run.expect("run finishes once all terminal");
        assert!(!run.all_succeeded());
        assert_eq!(run.failed_count(), 3);

        Ok(())
    })
    .await
}

#[tokio::test]
async fn runtime_reports_failure_and_exits_in_oneshot_mode() -> TestResult {
    with_timeout(async {
        init_tracing();

        let cfg = diamond();
        let executed = Arc::new(Mutex::new(Vec::new()));
        let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(64);

        let executor =
            FakeExecutor::new(rt_tx.clone(), Arc::clone(&executed)).with_failing(&["images"]);

        for stage in ["images", "fonts", "bundle"] {
            rt_tx
                .send(RuntimeEvent::StageTriggered {
                    stage: stage.to_string(),
                    reason: TriggerReason::Startup,
                })
                .await?;
        }

        let core = CoreRuntime::new(
            Scheduler::from_config(&cfg),
            1,
            RuntimeOptions {
                exit_when_idle: true,
                reload_on_success: false,
            },
        );
        let runtime = Runtime::new(core, rt_rx, executor, Arc::new(NullNotifier));

        let report: PipelineRun = runtime.run().await?.expect("one run should complete");
        assert!(!report.all_succeeded());
        assert_eq!(report.failed_count(), 2); // images failed, bundle skipped

        // bundle's transforms never executed.
        let executed = executed.lock().unwrap().clone();
        assert!(executed.contains(&"images".to_string()));
        assert!(executed.contains(&"fonts".to_string()));
        assert!(!executed.contains(&"bundle".to_string()));

        Ok(())
    })
    .await
}
