use crate::output::{print_json, print_table};
use anyhow::Context;
use relay_core::{run::RunRecord, store::ArtifactStore, types::Stage};
use serde::Serialize;
use std::path::Path;

#[derive(Serialize)]
struct StageRow {
    number: u8,
    stage: Stage,
    file: String,
    state: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    agent: Option<String>,
}

pub fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    let store = ArtifactStore::open(root);
    let record = RunRecord::load_optional(root).context("failed to read run log")?;

    let mut rows = Vec::new();
    for &stage in Stage::all() {
        let (state, agent) = if store.exists(stage) {
            let artifact = store
                .get(stage)
                .with_context(|| format!("failed to read {}", stage.filename()))?;
            ("present", artifact.meta.agent)
        } else if record.as_ref().is_some_and(|r| r.waived.contains(&stage)) {
            let agent = record
                .as_ref()
                .and_then(|r| r.last_event_for(stage))
                .map(|e| e.agent.clone());
            ("waived", agent)
        } else {
            ("missing", None)
        };
        rows.push(StageRow {
            number: stage.number(),
            stage,
            file: stage.filename(),
            state,
            agent,
        });
    }

    if json {
        print_json(&serde_json::json!({
            "run": record,
            "stages": rows,
        }))?;
        return Ok(());
    }

    match &record {
        Some(r) => {
            println!("Run:     {} ({})", r.id, r.preset);
            println!("Status:  {}", r.status);
            println!("Started: {}", r.started_at.format("%Y-%m-%d %H:%M:%S UTC"));
            if let Some(finished) = r.finished_at {
                println!("Ended:   {}", finished.format("%Y-%m-%d %H:%M:%S UTC"));
            }
            if let (Some(agent), Some(stage)) = (&r.failed_agent, r.failed_stage) {
                println!("Failed:  {agent} at {}", stage.filename());
                if let Some(error) = &r.error {
                    println!("         {error}");
                }
                println!("Resume:  relay resume");
            }
        }
        None => println!("No run recorded yet."),
    }
    println!();

    print_table(
        &["#", "ARTIFACT", "STATE", "AGENT"],
        rows.into_iter()
            .map(|r| {
                vec![
                    r.number.to_string(),
                    r.file,
                    r.state.to_string(),
                    r.agent.unwrap_or_else(|| "-".to_string()),
                ]
            })
            .collect(),
    );
    Ok(())
}
