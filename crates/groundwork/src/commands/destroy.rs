use crate::output;
use colored::Colorize;
use groundwork_cloud::{RetryConfig, StateStore};
use groundwork_engine::{CancelToken, EngineError, Executor, plan_destroy};
use std::path::{Path, PathBuf};

pub async fn handle(file: &Path, state_dir: Option<PathBuf>, yes: bool) -> anyhow::Result<i32> {
    let desired = match groundwork_core::parse_stack_file(file) {
        Ok(desired) => desired,
        Err(e) => return Ok(super::spec_failure(&e)),
    };

    let dir = super::state_dir_for(file, state_dir);
    let mut store = match StateStore::open(&dir).await {
        Ok(store) => store,
        Err(e) => return Ok(super::state_failure(&e)),
    };

    let the_plan = plan_destroy(store.observed());

    output::render_plan(&the_plan);

    if the_plan.actions.is_empty() {
        println!();
        println!("  {} Nothing recorded as applied", "✓".green());
        return Ok(0);
    }

    if !yes {
        println!();
        println!(
            "{}",
            "Warning: destroy deletes cloud resources, including database data.".yellow()
        );
        println!("Run again with --yes to destroy");
        return Ok(0);
    }

    let provider = match super::provider_for(&desired) {
        Ok(provider) => provider,
        Err(code) => return Ok(code),
    };

    let lock = match store.acquire_lock().await {
        Ok(lock) => lock,
        Err(e) => return Ok(super::state_failure(&e)),
    };

    let cancel = CancelToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        });
    }

    println!();
    println!(
        "  {} Destroying {} resources...",
        "→".cyan(),
        the_plan.actions.len()
    );

    let executor = Executor::new(RetryConfig::default());
    let result = executor
        .apply(&the_plan, &provider, &mut store, &cancel)
        .await;

    let report = match result {
        Ok(report) => report,
        Err(EngineError::State(e)) => {
            let _ = lock.release().await;
            return Ok(super::state_failure(&e));
        }
        Err(EngineError::Spec(e)) => {
            let _ = lock.release().await;
            return Ok(super::spec_failure(&e));
        }
    };

    lock.release().await.ok();

    output::render_report(&report);
    Ok(super::report_exit_code(&report))
}
