// ABOUTME: Deploy command implementation.
// ABOUTME: Runs one orchestrated deploy and aborts it cleanly on Ctrl-C.

use std::sync::Arc;
use zeroshift::deploy::Orchestrator;
use zeroshift::error::Result;
use zeroshift::output::Output;
use zeroshift::types::ImageRef;
use zeroshift::validate::{HttpProbe, Validator};

use super::{App, project_id};

pub async fn deploy(app: App, project: &str, image: &str, mut output: Output) -> Result<()> {
    let image = ImageRef::parse(image)?;
    let runtime = app.runtime()?;
    let orchestrator = Orchestrator::new(
        app.store.clone(),
        runtime.clone(),
        app.traffic(),
        Validator::new(runtime, Arc::new(HttpProbe)),
        app.config.network.clone(),
    );

    output.start_timer();
    output.progress(&format!("Deploying {image} to {project}..."));

    let interrupted = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };
    let outcome = orchestrator
        .deploy_until(&project_id(project), &image.to_string(), interrupted)
        .await?;

    for warning in &outcome.warnings {
        output.warning(&warning.message);
    }
    output.finish(&outcome.message, &outcome);
    Ok(())
}
