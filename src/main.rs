//! DataForge command-line runner
//!
//! Loads a project file, executes its pipeline and prints every node's output
//! dataset as JSON, keyed by the project's node ids.
//!
//! ```text
//! dataforge <project.json> [settings.toml]
//! ```

use anyhow::{bail, Context};
use dataforge_rs::{EngineSettings, PipelineError, ProjectFile};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout stays valid JSON
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,dataforge_rs=debug")),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut args = std::env::args_os().skip(1);
    let Some(project_path) = args.next().map(PathBuf::from) else {
        bail!("usage: dataforge <project.json> [settings.toml]");
    };
    let settings_path = args.next().map(PathBuf::from);

    let mut project = ProjectFile::load(&project_path)
        .with_context(|| format!("loading project {}", project_path.display()))?;
    if let Some(path) = settings_path {
        project.settings = EngineSettings::load(&path)
            .with_context(|| format!("loading settings {}", path.display()))?;
    }

    tracing::info!(
        "Running project '{}' from {:?}",
        project.pipeline.name,
        project_path
    );

    let mut built = project.build().context("building pipeline")?;
    let outputs = match built.pipeline.execute() {
        Ok(outputs) => outputs,
        Err(PipelineError::Operator {
            node_id,
            kind,
            source,
            partial,
        }) => {
            let node = built
                .node_ids
                .iter()
                .find(|(_, id)| **id == node_id)
                .map(|(name, _)| name.as_str())
                .unwrap_or("?");
            tracing::warn!(
                "{} of {} nodes completed before the failure",
                partial.len(),
                built.pipeline.node_count()
            );
            bail!("node '{}' ({}) failed: {}", node, kind, source);
        }
        Err(e) => return Err(e).context("executing pipeline"),
    };

    let named = built.name_outputs(&outputs);
    let json = serde_json::to_string_pretty(&named).context("serializing outputs")?;
    println!("{}", json);
    Ok(())
}
