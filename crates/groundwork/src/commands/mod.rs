pub mod apply;
pub mod destroy;
pub mod plan;
pub mod validate;

use colored::Colorize;
use groundwork_cloud::{ErrorClass, StateStoreError};
use groundwork_cloud_gcp::GcloudProvider;
use groundwork_core::{DesiredState, SpecError};
use groundwork_engine::{ApplyReport, ApplyStatus};
use std::path::{Path, PathBuf};

/// Exit codes per error taxonomy class
pub const EXIT_SPEC_ERROR: i32 = 2;
pub const EXIT_TRANSIENT: i32 = 3;
pub const EXIT_PERMANENT: i32 = 4;
pub const EXIT_STATE_ERROR: i32 = 5;

/// State directory for a stack file, unless overridden
pub fn state_dir_for(file: &Path, state_dir: Option<PathBuf>) -> PathBuf {
    state_dir.unwrap_or_else(|| {
        file.parent()
            .unwrap_or_else(|| Path::new("."))
            .join(".groundwork")
    })
}

pub fn spec_failure(err: &SpecError) -> i32 {
    eprintln!("{} {}", "Error:".red().bold(), err);
    EXIT_SPEC_ERROR
}

pub fn state_failure(err: &StateStoreError) -> i32 {
    eprintln!("{} {}", "Error:".red().bold(), err);
    EXIT_STATE_ERROR
}

/// Build the provider declared in the stack file
pub fn provider_for(desired: &DesiredState) -> Result<GcloudProvider, i32> {
    let Some(settings) = desired.provider.as_ref() else {
        eprintln!(
            "{} stack file declares no provider",
            "Error:".red().bold()
        );
        return Err(EXIT_SPEC_ERROR);
    };

    if settings.name != "gcp" {
        eprintln!(
            "{} unknown provider: {}",
            "Error:".red().bold(),
            settings.name
        );
        return Err(EXIT_SPEC_ERROR);
    }

    GcloudProvider::from_settings(settings).map_err(|e| {
        eprintln!("{} {}", "Error:".red().bold(), e);
        EXIT_SPEC_ERROR
    })
}

/// Exit code for a finished apply run.
///
/// The failing resource id goes to stderr so scripts can pick it up.
pub fn report_exit_code(report: &ApplyReport) -> i32 {
    if report.is_success() {
        return 0;
    }

    if let Some(outcome) = report.failure() {
        let class = match &outcome.status {
            ApplyStatus::Failed { class, .. } => *class,
            _ => ErrorClass::Permanent,
        };
        eprintln!(
            "{} resource '{}' failed ({})",
            "Error:".red().bold(),
            outcome.resource_id,
            class
        );
        return match class {
            ErrorClass::Transient => EXIT_TRANSIENT,
            ErrorClass::Permanent => EXIT_PERMANENT,
        };
    }

    // Cancelled without a failing resource
    1
}
