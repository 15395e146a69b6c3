use crate::output;
use groundwork_cloud::StateStore;
use groundwork_engine::{PlanOptions, plan};
use std::path::{Path, PathBuf};

pub async fn handle(file: &Path, state_dir: Option<PathBuf>, prune: bool) -> anyhow::Result<i32> {
    let desired = match groundwork_core::parse_stack_file(file) {
        Ok(desired) => desired,
        Err(e) => return Ok(super::spec_failure(&e)),
    };

    let dir = super::state_dir_for(file, state_dir);
    let store = match StateStore::open(&dir).await {
        Ok(store) => store,
        Err(e) => return Ok(super::state_failure(&e)),
    };

    let the_plan = match plan(&desired, store.observed(), PlanOptions { prune }) {
        Ok(plan) => plan,
        Err(e) => return Ok(super::spec_failure(&e)),
    };

    output::render_plan(&the_plan);
    Ok(0)
}
