use crate::output::print_json;
use anyhow::Context;
use relay_core::{config::Config, io, paths};
use std::path::Path;

pub fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    let mut created = Vec::new();

    for dir in [paths::SHARED_DIR, paths::AGENTS_DIR, paths::PRESETS_DIR] {
        let p = root.join(dir);
        if !p.is_dir() {
            created.push(dir.to_string());
        }
        io::ensure_dir(&p).with_context(|| format!("failed to create {}", p.display()))?;
    }

    let config_path = paths::config_path(root);
    if !config_path.exists() {
        Config::default()
            .save(root)
            .context("failed to write config.yaml")?;
        created.push(paths::CONFIG_FILE.to_string());
    }

    if json {
        print_json(&serde_json::json!({
            "root": root.display().to_string(),
            "created": created,
        }))?;
        return Ok(());
    }

    println!("Initialized relay in: {}", root.display());
    for dir in [
        paths::SHARED_DIR,
        paths::AGENTS_DIR,
        paths::PRESETS_DIR,
        paths::CONFIG_FILE,
    ] {
        let verb = if created.iter().any(|c| c == dir) {
            "created:"
        } else {
            "exists: "
        };
        println!("  {verb} {dir}");
    }
    println!("\nNext: relay run webapp");
    Ok(())
}
