// tests/stage_chain.rs

//! Scheduler semantics over a dependent stage chain.

use std::error::Error;

use buildpipe::config::ConfigFile;
use buildpipe::engine::StageOutcome;
use buildpipe::pipeline::{Scheduler, StageRunState};
use buildpipe_test_utils::builders::{ConfigFileBuilder, StageConfigBuilder};
use buildpipe_test_utils::{init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

fn chain() -> ConfigFile {
    ConfigFileBuilder::new()
        .with_stage(
            "styles",
            StageConfigBuilder::new("app/styles/**/*.style", "app/css").build(),
        )
        .with_stage(
            "bundle",
            StageConfigBuilder::new("app/*.html", "dist")
                .depends_on("styles")
                .build(),
        )
        .with_stage(
            "publish",
            StageConfigBuilder::new("dist/**/*", "public")
                .depends_on("bundle")
                .build(),
        )
        .build()
}

#[tokio::test]
async fn completions_cascade_down_the_chain() -> TestResult {
    with_timeout(async {
        init_tracing();

        let mut scheduler = Scheduler::from_config(&chain());

        scheduler.start_new_run();
        let r = scheduler.handle_trigger("styles");
        assert_eq!(r[0].name, "styles");

        let r = scheduler.handle_completion("styles", StageOutcome::Success);
        assert_eq!(r[0].name, "bundle");

        let r = scheduler.handle_completion("bundle", StageOutcome::Success);
        assert_eq!(r[0].name, "publish");

        scheduler.handle_completion("publish", StageOutcome::Success);
        assert!(scheduler.is_idle());

        // A later run triggered mid-chain only re-runs from that point.
        scheduler.start_new_run();

        let ready = scheduler.handle_trigger("bundle");
        assert_eq!(ready[0].name, "bundle");

        let ready = scheduler.handle_completion("bundle", StageOutcome::Success);
        assert_eq!(ready[0].name, "publish");

        Ok(())
    })
    .await
}

#[tokio::test]
async fn triggering_two_stages_together_runs_the_chain_once() -> TestResult {
    with_timeout(async {
        init_tracing();

        let mut scheduler = Scheduler::from_config(&chain());

        scheduler.start_new_run();

        let r = scheduler.handle_trigger("styles");
        assert_eq!(r[0].name, "styles");

        // bundle depends on styles, so it is not ready yet.
        let r = scheduler.handle_trigger("bundle");
        assert!(r.is_empty());

        let r = scheduler.handle_completion("styles", StageOutcome::Success);
        assert_eq!(r[0].name, "bundle");

        let r = scheduler.handle_completion("bundle", StageOutcome::Success);
        assert_eq!(r[0].name, "publish");

        let r = scheduler.handle_completion("publish", StageOutcome::Success);
        assert!(r.is_empty());
        assert!(scheduler.is_idle());

        Ok(())
    })
    .await
}

#[tokio::test]
async fn manual_stepping_exposes_run_state_and_report() -> TestResult {
    with_timeout(async {
        init_tracing();

        let mut scheduler = Scheduler::from_config(&chain());

        assert!(scheduler.is_idle());
        assert_eq!(scheduler.current_run_id(), None);

        scheduler.start_new_run();
        let run_id = scheduler.current_run_id().expect("run should be active");
        assert!(run_id > 0);

        let step = scheduler.step_trigger("styles");
        assert_eq!(
            step.newly_scheduled
                .iter()
                .map(|s| s.name.as_str())
                .collect::<Vec<_>>(),
            vec!["styles"]
        );
        assert!(!step.run_just_finished());

        // The whole chain participates in the run.
        let mut in_run = scheduler.stages_in_current_run();
        in_run.sort();
        assert_eq!(
            in_run,
            vec![
                "bundle".to_string(),
                "publish".to_string(),
                "styles".to_string()
            ]
        );

        assert_eq!(
            scheduler.run_state_of("styles"),
            Some(StageRunState::Running)
        );
        assert_eq!(
            scheduler.run_state_of("bundle"),
            Some(StageRunState::Pending)
        );
        assert_eq!(scheduler.deps_satisfied("bundle"), Some(false));

        let step = scheduler.step_completion("styles", StageOutcome::Success);
        assert_eq!(
            step.newly_scheduled
                .iter()
                .map(|s| s.name.as_str())
                .collect::<Vec<_>>(),
            vec!["bundle"]
        );
        assert!(step.newly_skipped.is_empty());

        let step = scheduler.step_completion("bundle", StageOutcome::Success);
        assert_eq!(
            step.newly_scheduled
                .iter()
                .map(|s| s.name.as_str())
                .collect::<Vec<_>>(),
            vec!["publish"]
        );

        let step = scheduler.step_completion("publish", StageOutcome::Success);
        assert!(step.newly_scheduled.is_empty());

        let run = step.finished_run.expect("run should have finished");
        assert_eq!(run.run_id, run_id);
        assert_eq!(
            run.stages_executed,
            vec!["styles".to_string(), "bundle".to_string(), "publish".to_string()]
        );
        assert!(run.all_succeeded());
        assert!(scheduler.is_idle());
        assert!(scheduler.stages_in_current_run().is_empty());

        Ok(())
    })
    .await
}

#[tokio::test]
async fn independent_stages_dispatch_as_one_concurrent_group() -> TestResult {
    with_timeout(async {
        init_tracing();

        let cfg = ConfigFileBuilder::new()
            .with_stage(
                "styles",
                StageConfigBuilder::new("app/styles/**/*.style", "app/css").build(),
            )
            .with_stage(
                "images",
                StageConfigBuilder::new("app/images/**/*.png", "dist/images").build(),
            )
            .with_stage(
                "fonts",
                StageConfigBuilder::new("app/fonts/**/*", "dist/fonts").build(),
            )
            .build();

        let mut scheduler = Scheduler::from_config(&cfg);
        scheduler.start_new_run();

        let mut dispatched: Vec<String> = Vec::new();
        for name in ["styles", "images", "fonts"] {
            dispatched.extend(scheduler.handle_trigger(name).into_iter().map(|s| s.name));
        }
        dispatched.sort();

        // No ordering dependency between them: all three are in flight at once.
        assert_eq!(dispatched, vec!["fonts", "images", "styles"]);
        assert!(!scheduler.is_idle());

        Ok(())
    })
    .await
}
