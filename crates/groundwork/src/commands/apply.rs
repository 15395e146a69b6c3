use crate::output;
use colored::Colorize;
use groundwork_cloud::{ResourceProvider, RetryConfig, StateStore};
use groundwork_engine::{CancelToken, EngineError, Executor, PlanOptions, plan};
use std::path::{Path, PathBuf};

pub async fn handle(
    file: &Path,
    state_dir: Option<PathBuf>,
    prune: bool,
    yes: bool,
    retry: RetryConfig,
) -> anyhow::Result<i32> {
    let desired = match groundwork_core::parse_stack_file(file) {
        Ok(desired) => desired,
        Err(e) => return Ok(super::spec_failure(&e)),
    };

    let dir = super::state_dir_for(file, state_dir);
    let mut store = match StateStore::open(&dir).await {
        Ok(store) => store,
        Err(e) => return Ok(super::state_failure(&e)),
    };

    let the_plan = match plan(&desired, store.observed(), PlanOptions { prune }) {
        Ok(plan) => plan,
        Err(e) => return Ok(super::spec_failure(&e)),
    };

    output::render_plan(&the_plan);

    if !the_plan.has_changes {
        println!();
        println!("  {} Everything is up to date", "✓".green());
        return Ok(0);
    }

    if !yes {
        println!();
        println!(
            "{}",
            "Warning: apply provisions cloud resources that may incur cost.".yellow()
        );
        println!("Run again with --yes to apply this plan");
        return Ok(0);
    }

    let provider = match super::provider_for(&desired) {
        Ok(provider) => provider,
        Err(code) => return Ok(code),
    };

    match provider.check_auth().await {
        Ok(auth) if auth.authenticated => {
            if let Some(account) = auth.account_info {
                println!();
                println!("  Provider: {} ({})", provider.display_name().cyan(), account);
            }
        }
        Ok(auth) => {
            eprintln!(
                "{} provider authentication failed: {}",
                "Error:".red().bold(),
                auth.error.unwrap_or_else(|| "unknown".to_string())
            );
            return Ok(super::EXIT_PERMANENT);
        }
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            return Ok(super::EXIT_PERMANENT);
        }
    }

    let lock = match store.acquire_lock().await {
        Ok(lock) => lock,
        Err(e) => return Ok(super::state_failure(&e)),
    };

    // Ctrl-C stops the run at the next action boundary; applied resources
    // stay recorded
    let cancel = CancelToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("ctrl-c received, finishing the current action");
                cancel.cancel();
            }
        });
    }

    println!();
    println!(
        "  {} Applying {} actions...",
        "→".cyan(),
        the_plan.actions.len()
    );

    let executor = Executor::new(retry);
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
