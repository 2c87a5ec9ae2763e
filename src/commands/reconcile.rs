// ABOUTME: Reconcile command implementation.
// ABOUTME: Runs the self-healing pass and prints its counts.

use zeroshift::deploy::Reconciler;
use zeroshift::error::Result;
use zeroshift::output::Output;

use super::App;

pub async fn reconcile(app: App, output: Output) -> Result<()> {
    let reconciler = Reconciler::new(app.store.clone(), app.runtime()?);
    let report = reconciler.reconcile().await?;

    output.result(
        &format!(
            "Recovered {} interrupted deployment(s), invalidated {} dead active deployment(s)",
            report.deploying_fixed, report.active_invalidated
        ),
        &report,
    );
    if report.failures > 0 {
        output.warning(&format!(
            "{} record(s) could not be processed; see logs",
            report.failures
        ));
    }
    Ok(())
}
