use super::Project;
use crate::output::{print_json, print_table};
use anyhow::Context;
use clap::Subcommand;
use std::path::Path;

#[derive(Subcommand)]
pub enum PresetSubcommand {
    /// List builtin and project presets
    List,
    /// Show a preset's phases with substitutions applied
    Show { name: String },
    /// Build the dependency graph for a preset and report problems
    Validate { name: String },
}

pub fn run(root: &Path, subcmd: PresetSubcommand, json: bool) -> anyhow::Result<()> {
    let project = Project::load(root)?;
    match subcmd {
        PresetSubcommand::List => list(&project, json),
        PresetSubcommand::Show { name } => show(&project, &name, json),
        PresetSubcommand::Validate { name } => validate(&project, &name, json),
    }
}

fn list(project: &Project, json: bool) -> anyhow::Result<()> {
    let presets = project.presets.list();
    if json {
        return print_json(&presets);
    }
    let rows = presets
        .iter()
        .map(|p| {
            vec![
                p.name.clone(),
                p.phases.len().to_string(),
                p.description.clone(),
            ]
        })
        .collect();
    print_table(&["NAME", "PHASES", "DESCRIPTION"], rows);
    Ok(())
}

fn show(project: &Project, name: &str, json: bool) -> anyhow::Result<()> {
    let preset = project
        .presets
        .resolve(name)
        .with_context(|| format!("preset '{name}' not found"))?;
    if json {
        return print_json(preset);
    }

    println!("Preset: {}", preset.name);
    if !preset.description.is_empty() {
        println!("        {}", preset.description);
    }
    if let Some(base) = &preset.extends {
        println!("Extends: {base}");
    }
    for (i, phase) in preset.phases.iter().enumerate() {
        println!("\nPhase {} ({})", i + 1, phase.mode);
        for declared in &phase.agents {
            let effective = preset.effective(declared);
            if effective == declared {
                println!("  {declared}");
            } else {
                println!("  {effective}  (replaces {declared})");
            }
        }
    }
    if !preset.checks.is_empty() {
        println!("\nChecks:");
        for check in &preset.checks {
            println!(
                "  {} must mention: {}",
                check.stage.filename(),
                check.contains.join(", ")
            );
        }
    }
    Ok(())
}

fn validate(project: &Project, name: &str, json: bool) -> anyhow::Result<()> {
    let graph = project
        .presets
        .graph(name, &project.agents)
        .with_context(|| format!("preset '{name}' is invalid"))?;

    if json {
        print_json(&serde_json::json!({
            "preset": name,
            "valid": true,
            "phases": graph.phases(),
            "edges": graph.edges().len(),
        }))?;
        return Ok(());
    }

    let agents = graph.agents().count();
    println!(
        "Preset '{name}' is valid: {} phases, {agents} agents, {} dependencies.",
        graph.phases().len(),
        graph.edges().len()
    );
    Ok(())
}
