use crate::output::{print_json, print_table};
use anyhow::Context;
use clap::Subcommand;
use relay_core::{artifact::ArtifactMeta, store::ArtifactStore, types::Stage};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[derive(Subcommand)]
pub enum ArtifactSubcommand {
    /// List artifacts present in .shared/
    List,
    /// Print an artifact's content (stage slug, number, or file name)
    Show { stage: String },
    /// Write an artifact by hand (reads stdin unless --file is given)
    Put {
        stage: String,
        #[arg(long)]
        file: Option<PathBuf>,
        /// Record this agent as the producer
        #[arg(long)]
        agent: Option<String>,
        /// Replace an existing artifact
        #[arg(long)]
        overwrite: bool,
    },
}

pub fn run(root: &Path, subcmd: ArtifactSubcommand, json: bool) -> anyhow::Result<()> {
    let store = ArtifactStore::open(root);
    match subcmd {
        ArtifactSubcommand::List => list(&store, json),
        ArtifactSubcommand::Show { stage } => show(&store, &stage, json),
        ArtifactSubcommand::Put {
            stage,
            file,
            agent,
            overwrite,
        } => put(store.with_overwrite(overwrite), &stage, file, agent, json),
    }
}

fn parse_stage(s: &str) -> anyhow::Result<Stage> {
    Stage::from_str(s).with_context(|| format!("unknown stage: {s}"))
}

fn list(store: &ArtifactStore, json: bool) -> anyhow::Result<()> {
    let summaries = store.list().context("failed to list artifacts")?;
    if json {
        return print_json(&summaries);
    }
    if summaries.is_empty() {
        println!("No artifacts in {}", store.dir().display());
        return Ok(());
    }
    let rows = summaries
        .into_iter()
        .map(|s| {
            vec![
                s.filename,
                s.agent.unwrap_or_else(|| "-".to_string()),
                s.created_at
                    .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_else(|| "-".to_string()),
                s.bytes.to_string(),
            ]
        })
        .collect();
    print_table(&["ARTIFACT", "AGENT", "CREATED", "BYTES"], rows);
    Ok(())
}

fn show(store: &ArtifactStore, stage: &str, json: bool) -> anyhow::Result<()> {
    let stage = parse_stage(stage)?;
    let artifact = store.get(stage).context("failed to read artifact")?;
    if json {
        print_json(&serde_json::json!({
            "stage": artifact.stage,
            "path": artifact.path,
            "meta": artifact.meta,
            "content": artifact.content,
        }))?;
    } else {
        print!("{}", artifact.content);
    }
    Ok(())
}

fn put(
    store: ArtifactStore,
    stage: &str,
    file: Option<PathBuf>,
    agent: Option<String>,
    json: bool,
) -> anyhow::Result<()> {
    let stage = parse_stage(stage)?;
    let content = match &file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read stdin")?;
            buf
        }
    };

    let meta = ArtifactMeta {
        agent,
        created_at: Some(chrono::Utc::now()),
        inputs: Vec::new(),
    };
    let artifact = store
        .put(stage, &meta, &content)
        .with_context(|| format!("failed to write {}", stage.filename()))?;

    if json {
        print_json(&artifact.summary())?;
    } else {
        println!("Wrote {}", artifact.path.display());
    }
    Ok(())
}
