// ABOUTME: Rollback command implementation.
// ABOUTME: Reverts a project to the version active before the current one.

use zeroshift::deploy::RollbackCoordinator;
use zeroshift::error::Result;
use zeroshift::output::Output;

use super::{App, project_id};

pub async fn rollback(app: App, project: &str, mut output: Output) -> Result<()> {
    let coordinator = RollbackCoordinator::new(app.store.clone(), app.runtime()?, app.traffic());

    output.start_timer();
    output.progress(&format!("Rolling back {project}..."));

    let outcome = coordinator.rollback(&project_id(project)).await?;

    output.finish(&outcome.message, &outcome);
    Ok(())
}
