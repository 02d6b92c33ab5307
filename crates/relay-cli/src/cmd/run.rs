use super::Project;
use crate::output::print_json;
use anyhow::Context;
use relay_core::{
    executor::{Executor, ProcessExecutor},
    graph::DependencyGraph,
    run::RunRecord,
    runner::{RunOutcome, Runner, RunnerOptions},
    store::ArtifactStore,
    types::{RunStatus, Stage},
};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

// ---------------------------------------------------------------------------
// RunExit: typed non-zero exit codes (no std::process::exit in command code)
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum RunExit {
    Failed {
        agent: String,
        stage: Stage,
        error: String,
    },
    Aborted,
}

impl RunExit {
    pub fn exit_code(&self) -> i32 {
        match self {
            RunExit::Failed { .. } => 2,
            RunExit::Aborted => 130,
        }
    }
}

impl std::fmt::Display for RunExit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunExit::Failed {
                agent,
                stage,
                error,
            } => write!(
                f,
                "{error}\nartifacts before {} are kept; after fixing '{agent}' continue with `relay resume`",
                stage.filename()
            ),
            RunExit::Aborted => write!(f, "run aborted; continue with `relay resume`"),
        }
    }
}

impl std::error::Error for RunExit {}

// ---------------------------------------------------------------------------
// run / resume
// ---------------------------------------------------------------------------

pub fn run(root: &Path, preset: &str, clean: bool, dry_run: bool, json: bool) -> anyhow::Result<()> {
    let project = Project::load(root)?;
    let graph = project
        .presets
        .graph(preset, &project.agents)
        .with_context(|| format!("preset '{preset}' cannot run"))?;
    let store = ArtifactStore::open(root);

    if dry_run {
        return print_plan(&graph, &store, json);
    }

    if clean {
        let removed = store.remove_all().context("failed to remove artifacts")?;
        tracing::info!(removed, "clean run: existing artifacts removed");
    }
    let store = store.with_overwrite(clean);

    let mut record = RunRecord::new(preset);
    execute(&project, graph, store, &mut record, json)
}

pub fn resume(root: &Path, json: bool) -> anyhow::Result<()> {
    let mut record = RunRecord::load(root).context("nothing to resume")?;
    record.reopen();

    let project = Project::load(root)?;
    let graph = project
        .presets
        .graph(&record.preset, &project.agents)
        .with_context(|| format!("preset '{}' cannot run", record.preset))?;
    let store = ArtifactStore::open(root);

    execute(&project, graph, store, &mut record, json)
}

fn execute(
    project: &Project,
    graph: DependencyGraph,
    store: ArtifactStore,
    record: &mut RunRecord,
    json: bool,
) -> anyhow::Result<()> {
    let executor: Arc<dyn Executor> = Arc::new(ProcessExecutor::from_config(&project.config));
    let options = RunnerOptions::for_preset(&project.config, graph.preset());
    let runner = Runner::new(graph, store, executor, options);
    let abort = runner.abort_handle();

    let rt = tokio::runtime::Runtime::new().context("failed to start tokio runtime")?;
    let outcome = rt
        .block_on(async {
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    abort.abort();
                }
            });
            runner.run(record).await
        })
        .context("run stopped")?;

    if json {
        print_json(&outcome)?;
    } else {
        print_outcome(&outcome);
    }

    match outcome.status {
        RunStatus::Failed => Err(RunExit::Failed {
            agent: outcome.failed_agent.unwrap_or_default(),
            stage: outcome.failed_stage.unwrap_or(Stage::Requirements),
            error: outcome.error.unwrap_or_default(),
        }
        .into()),
        RunStatus::Aborted => Err(RunExit::Aborted.into()),
        _ => Ok(()),
    }
}

fn print_outcome(outcome: &RunOutcome) {
    println!("Run {} ({}): {}", outcome.run_id, outcome.preset, outcome.status);
    let list = |stages: &[Stage]| {
        stages
            .iter()
            .map(|s| s.filename())
            .collect::<Vec<_>>()
            .join(", ")
    };
    if !outcome.produced.is_empty() {
        println!("  produced: {}", list(&outcome.produced));
    }
    if !outcome.skipped.is_empty() {
        println!("  skipped:  {}", list(&outcome.skipped));
    }
    if !outcome.waived.is_empty() {
        println!("  waived:   {}", list(&outcome.waived));
    }
}

// ---------------------------------------------------------------------------
// dry run
// ---------------------------------------------------------------------------

fn print_plan(graph: &DependencyGraph, store: &ArtifactStore, json: bool) -> anyhow::Result<()> {
    let present: BTreeSet<Stage> = store.present();
    let ready = graph.next_ready(&present);

    if json {
        print_json(&serde_json::json!({
            "preset": graph.preset().name,
            "phases": graph.phases(),
            "present": present,
            "ready": ready,
        }))?;
        return Ok(());
    }

    println!("Preset: {}", graph.preset().name);
    for phase in graph.phases() {
        println!("\nPhase {} ({})", phase.ordinal, phase.mode);
        for name in &phase.agents {
            let def = graph.agent(name)?;
            let mark = if present.contains(&def.output) {
                "present"
            } else {
                "pending"
            };
            println!("  {:<30} -> {:<26} {mark}", name, def.output.filename());
        }
    }
    if ready.is_empty() {
        println!("\nNothing to run: every stage is present.");
    } else {
        println!("\nReady now: {}", ready.join(", "));
    }
    Ok(())
}
