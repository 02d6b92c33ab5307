use super::Project;
use crate::output::{print_json, print_table};
use anyhow::Context;
use clap::Subcommand;
use std::path::Path;

#[derive(Subcommand)]
pub enum AgentSubcommand {
    /// List builtin and project agents
    List,
    /// Show one agent's inputs, output and persona
    Show { name: String },
}

pub fn run(root: &Path, subcmd: AgentSubcommand, json: bool) -> anyhow::Result<()> {
    let project = Project::load(root)?;
    match subcmd {
        AgentSubcommand::List => list(&project, json),
        AgentSubcommand::Show { name } => show(&project, &name, json),
    }
}

fn list(project: &Project, json: bool) -> anyhow::Result<()> {
    let agents = project.agents.list();
    if json {
        return print_json(&agents);
    }

    let rows = agents
        .iter()
        .map(|d| {
            let inputs = d
                .inputs
                .iter()
                .map(|s| s.number().to_string())
                .collect::<Vec<_>>()
                .join(",");
            vec![
                d.name.clone(),
                d.output.filename(),
                if inputs.is_empty() { "-".to_string() } else { inputs },
                d.description.clone(),
            ]
        })
        .collect();
    print_table(&["NAME", "OUTPUT", "INPUTS", "DESCRIPTION"], rows);
    Ok(())
}

fn show(project: &Project, name: &str, json: bool) -> anyhow::Result<()> {
    let def = project
        .agents
        .resolve(name)
        .with_context(|| format!("agent '{name}' not found"))?;
    if json {
        return print_json(def);
    }

    println!("Name:     {}", def.name);
    if !def.description.is_empty() {
        println!("About:    {}", def.description);
    }
    println!("Output:   {}", def.output.filename());
    let inputs: Vec<String> = def.inputs.iter().map(|s| s.filename()).collect();
    println!(
        "Inputs:   {}",
        if inputs.is_empty() {
            "(none)".to_string()
        } else {
            inputs.join(", ")
        }
    );
    if def.optional {
        println!("Optional: yes");
    }
    for rule in &def.must {
        println!("  must:     {rule}");
    }
    for rule in &def.must_not {
        println!("  must not: {rule}");
    }
    if !def.persona.is_empty() {
        println!("\n{}", def.persona);
    }
    Ok(())
}
