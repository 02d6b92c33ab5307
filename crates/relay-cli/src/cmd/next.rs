use super::Project;
use crate::output::print_json;
use anyhow::Context;
use relay_core::{run::RunRecord, store::ArtifactStore};
use std::path::Path;

pub fn run(root: &Path, preset: &str, json: bool) -> anyhow::Result<()> {
    let project = Project::load(root)?;
    let graph = project
        .presets
        .graph(preset, &project.agents)
        .with_context(|| format!("preset '{preset}' cannot run"))?;

    let mut satisfied = ArtifactStore::open(root).present();
    // Waivers only carry over from a run of the same preset.
    if let Some(record) = RunRecord::load_optional(root).context("failed to read run log")? {
        if record.preset == preset {
            satisfied.extend(record.waived);
        }
    }

    let ready = graph.next_ready(&satisfied);
    let complete = graph.is_complete(&satisfied);

    if json {
        print_json(&serde_json::json!({
            "preset": preset,
            "ready": ready,
            "complete": complete,
        }))?;
        return Ok(());
    }

    if complete {
        println!("Preset '{preset}' is complete: every stage is present.");
        return Ok(());
    }
    for name in &ready {
        let def = graph.agent(name)?;
        println!("{name:<30} -> {}", def.output.filename());
    }
    Ok(())
}
