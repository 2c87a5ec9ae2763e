// ABOUTME: Read-only commands: list, status, logs and metrics.
// ABOUTME: Human tables in normal mode, raw results with --json.

use zeroshift::deploy::{ProjectState, Queries};
use zeroshift::error::Result;
use zeroshift::output::Output;
use zeroshift::store::Deployment;

use super::{App, project_id};

fn deployment_row(d: &Deployment) -> String {
    format!(
        "{:<12} v{:<5} {:<12} {:<6} {:<6} {:<24} {}",
        d.project_id,
        d.version,
        d.status,
        d.color,
        d.port,
        d.image,
        d.created_at.format("%Y-%m-%d %H:%M:%S")
    )
}

pub async fn list(app: App, project: Option<&str>, output: Output) -> Result<()> {
    let queries = Queries::new(app.store.clone());
    let project = project.map(project_id);
    let deployments = queries.list_deployments(project.as_ref()).await?;

    let human = if deployments.is_empty() {
        "No deployments".to_string()
    } else {
        let mut lines = vec![format!(
            "{:<12} {:<6} {:<12} {:<6} {:<6} {:<24} {}",
            "PROJECT", "VER", "STATUS", "COLOR", "PORT", "IMAGE", "CREATED"
        )];
        lines.extend(deployments.iter().map(deployment_row));
        lines.join("\n")
    };
    output.result(&human, &deployments);
    Ok(())
}

pub async fn status(app: App, project: &str, output: Output) -> Result<()> {
    let queries = Queries::new(app.store.clone());
    let status = queries.project_status(&project_id(project)).await?;

    let human = match (&status.status, &status.active_deployment) {
        (ProjectState::Active, Some(d)) => format!(
            "{project}: active v{} ({}) on port {}, image {}",
            d.version, d.color, d.port, d.image
        ),
        _ => format!("{project}: idle"),
    };
    output.result(&human, &status);
    Ok(())
}

pub async fn logs(app: App, project: &str, tail: usize, output: Output) -> Result<()> {
    let runtime = app.runtime()?;
    let logs = Queries::new(app.store.clone())
        .project_logs(runtime.as_ref(), &project_id(project), tail)
        .await?;

    let human = match &logs.container_name {
        None => format!("{project} has no deployments"),
        Some(_) => logs.lines.join("\n"),
    };
    output.result(&human, &logs);
    Ok(())
}

pub async fn metrics(app: App, project: &str, output: Output) -> Result<()> {
    let runtime = app.runtime()?;
    let m = Queries::new(app.store.clone())
        .project_metrics(runtime.as_ref(), &project_id(project))
        .await?;

    let human = if m.running {
        format!(
            "cpu {:.1}%  mem {} / {} ({:.1}%)  net {} in / {} out  block {} in / {} out  pids {}",
            m.cpu_percent,
            m.memory_used,
            m.memory_limit,
            m.memory_percent,
            m.net_in,
            m.net_out,
            m.block_in,
            m.block_out,
            m.pids
        )
    } else {
        format!("{project}: not running")
    };
    output.result(&human, &m);
    Ok(())
}
