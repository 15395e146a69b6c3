use colored::Colorize;
use groundwork_cloud::{ObservedState, ResourceProvider};
use groundwork_engine::{PlanOptions, plan};
use std::path::Path;

/// Offline graph validation plus an auth check when a provider is
/// configured
pub async fn handle(file: &Path) -> anyhow::Result<i32> {
    let desired = match groundwork_core::parse_stack_file(file) {
        Ok(desired) => desired,
        Err(e) => return Ok(super::spec_failure(&e)),
    };

    // Planning against empty state exercises the cycle check without
    // touching the state store or the provider
    if let Err(e) = plan(&desired, &ObservedState::new(), PlanOptions::default()) {
        return Ok(super::spec_failure(&e));
    }

    println!();
    println!("  {} Stack file is valid", "✓".green());
    println!("    • project: {}", desired.project.cyan());
    println!("    • {} resources", desired.resources.len());

    if desired.provider.is_some() {
        let provider = match super::provider_for(&desired) {
            Ok(provider) => provider,
            Err(code) => return Ok(code),
        };

        match provider.check_auth().await {
            Ok(auth) if auth.authenticated => {
                println!(
                    "    • provider: {} ({})",
                    provider.display_name().cyan(),
                    auth.account_info.unwrap_or_else(|| "unknown".to_string())
                );
            }
            Ok(auth) => {
                println!(
                    "    • provider: {} — {} {}",
                    provider.display_name().cyan(),
                    "not authenticated:".yellow(),
                    auth.error.unwrap_or_else(|| "unknown".to_string())
                );
            }
            Err(e) => {
                println!(
                    "    • provider: {} — {} {}",
                    provider.display_name().cyan(),
                    "check failed:".yellow(),
                    e
                );
            }
        }
    }

    Ok(0)
}
