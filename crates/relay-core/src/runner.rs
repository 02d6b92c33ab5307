//! Drives one preset run to completion.
//!
//! The loop is: compute the satisfied set (artifacts on disk plus waived
//! stages), ask the graph for the ready batch, dispatch the batch
//! concurrently, repeat. A batch is a barrier: the next `next_ready` call only
//! happens once every member has produced, waived, or failed. Every state
//! change is written to `.shared/run.yaml` before the loop moves on.

use crate::artifact::ArtifactMeta;
use crate::config::{Config, RetryConfig};
use crate::error::{RelayError, Result};
use crate::executor::{AgentRequest, Executor, ExecutorError};
use crate::graph::DependencyGraph;
use crate::preset::{ArtifactValidator, WorkflowPreset};
use crate::agent::AgentDefinition;
use crate::run::{EventKind, RunRecord};
use crate::store::ArtifactStore;
use crate::types::{RunStatus, Stage};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

// ---------------------------------------------------------------------------
// Options and handles
// ---------------------------------------------------------------------------

pub struct RunnerOptions {
    pub retry: RetryConfig,
    /// Agents whose exhausted retries waive their stage, on top of
    /// definitions marked `optional`.
    pub optional: BTreeSet<String>,
    pub validators: Vec<Box<dyn ArtifactValidator>>,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            optional: BTreeSet::new(),
            validators: Vec::new(),
        }
    }
}

impl RunnerOptions {
    /// Retry policy and optional agents from `config`, output checks from `preset`.
    pub fn for_preset(config: &Config, preset: &WorkflowPreset) -> Self {
        Self {
            retry: config.retry.clone(),
            optional: config.optional_agents.iter().cloned().collect(),
            validators: preset
                .checks
                .iter()
                .cloned()
                .map(|c| Box::new(c) as Box<dyn ArtifactValidator>)
                .collect(),
        }
    }
}

/// Cancels a run from outside. In-flight executor calls are dropped, which
/// kills their child processes; artifacts already written stay.
#[derive(Clone)]
pub struct AbortHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl AbortHandle {
    pub fn abort(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_aborted(&self) -> bool {
        *self.tx.borrow()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub run_id: String,
    pub preset: String,
    pub status: RunStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_agent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_stage: Option<Stage>,
    pub produced: Vec<Stage>,
    pub skipped: Vec<Stage>,
    pub waived: Vec<Stage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// How a single dispatched agent ended.
enum Dispatch {
    Produced,
    /// Someone else wrote the stage while this agent was running.
    AlreadyPresent,
    Waived,
    Failed { attempts: u32, error: String },
}

/// The run record shared by concurrently dispatched agents.
struct Journal<'r> {
    root: PathBuf,
    record: Mutex<&'r mut RunRecord>,
}

impl Journal<'_> {
    fn update<T>(&self, f: impl FnOnce(&mut RunRecord) -> T) -> Result<T> {
        let mut guard = self.record.lock().unwrap_or_else(|p| p.into_inner());
        let out = f(&mut **guard);
        guard.save(&self.root)?;
        Ok(out)
    }

    fn log(&self, agent: &str, stage: Stage, kind: EventKind) -> Result<()> {
        self.update(|r| r.record(agent, stage, kind))
    }

    fn waived(&self) -> BTreeSet<Stage> {
        let guard = self.record.lock().unwrap_or_else(|p| p.into_inner());
        guard.waived.clone()
    }
}

// ---------------------------------------------------------------------------
// Runner
// ---------------------------------------------------------------------------

pub struct Runner {
    graph: DependencyGraph,
    store: ArtifactStore,
    executor: Arc<dyn Executor>,
    options: RunnerOptions,
    abort_tx: Arc<watch::Sender<bool>>,
}

impl Runner {
    pub fn new(
        graph: DependencyGraph,
        store: ArtifactStore,
        executor: Arc<dyn Executor>,
        options: RunnerOptions,
    ) -> Self {
        let (abort_tx, _) = watch::channel(false);
        Self {
            graph,
            store,
            executor,
            options,
            abort_tx: Arc::new(abort_tx),
        }
    }

    pub fn abort_handle(&self) -> AbortHandle {
        AbortHandle {
            tx: self.abort_tx.clone(),
        }
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Run `record` until it completes, fails, or is aborted.
    ///
    /// A failed or aborted run is reported through `RunOutcome::status`;
    /// `Err` is reserved for broken invariants and I/O.
    pub async fn run(&self, record: &mut RunRecord) -> Result<RunOutcome> {
        let preset = self.graph.preset().name.clone();
        let run_id = record.id.clone();
        let journal = Journal {
            root: self.store.root().to_path_buf(),
            record: Mutex::new(record),
        };

        let mut outcome = RunOutcome {
            run_id,
            preset,
            status: RunStatus::Running,
            failed_agent: None,
            failed_stage: None,
            produced: Vec::new(),
            skipped: Vec::new(),
            waived: Vec::new(),
            error: None,
        };

        let result = self.drive(&journal, &mut outcome).await;
        if let Err(e) = &result {
            outcome.error = Some(e.to_string());
            journal.update(|r| {
                r.error = Some(e.to_string());
                r.finish(RunStatus::Failed);
            })?;
        }
        result.map(|()| outcome)
    }

    async fn drive(&self, journal: &Journal<'_>, outcome: &mut RunOutcome) -> Result<()> {
        journal.update(|r| r.start())?;
        tracing::info!(preset = %outcome.preset, run = %outcome.run_id, "run started");

        let present = self.store.present();
        for def in self.graph.agents() {
            if present.contains(&def.output) {
                tracing::info!(agent = %def.name, stage = %def.output, "artifact present, skipping");
                journal.log(
                    &def.name,
                    def.output,
                    EventKind::Skipped {
                        reason: format!("{} already present", def.output.filename()),
                    },
                )?;
                outcome.skipped.push(def.output);
            }
        }

        let mut abort_rx = self.abort_tx.subscribe();
        loop {
            if *abort_rx.borrow() {
                return self.aborted(journal, outcome);
            }

            let mut satisfied = self.store.present();
            satisfied.extend(journal.waived());

            let batch = self.graph.next_ready(&satisfied);
            if batch.is_empty() {
                if self.graph.is_complete(&satisfied) {
                    journal.update(|r| r.finish(RunStatus::Completed))?;
                    outcome.status = RunStatus::Completed;
                    tracing::info!(
                        produced = outcome.produced.len(),
                        skipped = outcome.skipped.len(),
                        waived = outcome.waived.len(),
                        "run completed"
                    );
                    return Ok(());
                }
                return Err(self.stuck(&satisfied));
            }
            tracing::debug!(batch = ?batch, "dispatching");

            let dispatches =
                futures::future::join_all(batch.iter().map(|name| self.dispatch(name, journal, &satisfied)));
            let results = tokio::select! {
                results = dispatches => results,
                _ = abort_rx.wait_for(|aborted| *aborted) => {
                    return self.aborted(journal, outcome);
                }
            };

            let mut failure: Option<(String, Stage, u32, String)> = None;
            for (name, result) in batch.iter().zip(results) {
                let stage = self.graph.agent(name)?.output;
                match result? {
                    Dispatch::Produced => outcome.produced.push(stage),
                    Dispatch::AlreadyPresent => outcome.skipped.push(stage),
                    Dispatch::Waived => {
                        journal.update(|r| r.waived.insert(stage))?;
                        outcome.waived.push(stage);
                    }
                    Dispatch::Failed { attempts, error } => {
                        if failure.is_none() {
                            failure = Some((name.clone(), stage, attempts, error));
                        }
                    }
                }
            }

            if let Some((agent, stage, attempts, message)) = failure {
                let err = RelayError::ExecutorFailure {
                    agent: agent.clone(),
                    stage,
                    attempts,
                    message,
                };
                tracing::error!(agent = %agent, stage = %stage, "{err}");
                journal.update(|r| r.fail(&agent, stage, err.to_string()))?;
                outcome.status = RunStatus::Failed;
                outcome.failed_agent = Some(agent);
                outcome.failed_stage = Some(stage);
                outcome.error = Some(err.to_string());
                return Ok(());
            }
        }
    }

    fn aborted(&self, journal: &Journal<'_>, outcome: &mut RunOutcome) -> Result<()> {
        tracing::warn!(run = %outcome.run_id, "run aborted");
        journal.update(|r| r.finish(RunStatus::Aborted))?;
        outcome.status = RunStatus::Aborted;
        Ok(())
    }

    /// Nothing is ready yet the preset is unfinished: an input vanished
    /// from the store mid-run.
    fn stuck(&self, satisfied: &BTreeSet<Stage>) -> RelayError {
        match self.graph.pending(satisfied).first() {
            Some(def) => RelayError::MissingRequiredInput {
                agent: def.name.clone(),
                missing: missing_inputs(def, satisfied),
            },
            None => RelayError::MissingRequiredInput {
                agent: String::new(),
                missing: Vec::new(),
            },
        }
    }

    // -----------------------------------------------------------------------
    // Dispatch
    // -----------------------------------------------------------------------

    async fn dispatch(
        &self,
        name: &str,
        journal: &Journal<'_>,
        satisfied: &BTreeSet<Stage>,
    ) -> Result<Dispatch> {
        let def = self.graph.agent(name)?;
        let stage = def.output;

        let missing = missing_inputs(def, satisfied);
        if !missing.is_empty() {
            return Err(RelayError::MissingRequiredInput {
                agent: def.name.clone(),
                missing,
            });
        }

        let waived = journal.waived();
        let request = AgentRequest {
            agent: def.name.clone(),
            stage,
            prompt: self.build_prompt(def, &waived)?,
            project_root: self.store.root().to_path_buf(),
        };
        let produced_inputs: Vec<Stage> = def
            .inputs
            .iter()
            .copied()
            .filter(|s| !waived.contains(s))
            .collect();

        let attempts = self.options.retry.attempts();
        let mut last_error = String::new();
        for attempt in 1..=attempts {
            journal.log(name, stage, EventKind::Started { attempt })?;
            tracing::info!(agent = %name, stage = %stage, attempt, "agent started");

            match self.attempt(&request).await {
                Ok(content) => {
                    let meta = ArtifactMeta::produced_by(name, &produced_inputs);
                    match self.store.put(stage, &meta, &content) {
                        Ok(_) => {}
                        Err(RelayError::DuplicateArtifact(_)) => {
                            tracing::warn!(agent = %name, stage = %stage, "artifact appeared while agent ran; keeping existing");
                            journal.log(
                                name,
                                stage,
                                EventKind::Skipped {
                                    reason: "written concurrently by another writer".to_string(),
                                },
                            )?;
                            return Ok(Dispatch::AlreadyPresent);
                        }
                        Err(e) => return Err(e),
                    }
                    journal.log(name, stage, EventKind::Succeeded { attempt })?;
                    tracing::info!(agent = %name, stage = %stage, attempt, "agent succeeded");
                    return Ok(Dispatch::Produced);
                }
                Err(e) => {
                    last_error = e.to_string();
                    tracing::warn!(agent = %name, stage = %stage, attempt, error = %e, "agent attempt failed");
                    journal.log(
                        name,
                        stage,
                        EventKind::Failed {
                            attempt,
                            error: last_error.clone(),
                        },
                    )?;
                    if attempt < attempts {
                        tokio::time::sleep(self.options.retry.backoff(attempt)).await;
                    }
                }
            }
        }

        if def.optional || self.options.optional.contains(name) {
            tracing::warn!(agent = %name, stage = %stage, "optional agent failed; stage waived");
            journal.log(name, stage, EventKind::Waived { error: last_error })?;
            return Ok(Dispatch::Waived);
        }
        Ok(Dispatch::Failed {
            attempts,
            error: last_error,
        })
    }

    async fn attempt(&self, request: &AgentRequest) -> std::result::Result<String, ExecutorError> {
        let call = self.executor.execute(request);
        let content = match self.executor.timeout(&request.agent) {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| ExecutorError::Timeout(limit))??,
            None => call.await?,
        };
        for validator in &self.options.validators {
            validator
                .validate(request.stage, &content)
                .map_err(ExecutorError::Rejected)?;
        }
        Ok(content)
    }

    /// Persona, rules, every input artifact, then the output contract.
    fn build_prompt(&self, def: &AgentDefinition, waived: &BTreeSet<Stage>) -> Result<String> {
        let mut sections = vec![format!("# Agent: {}", def.name)];
        if !def.persona.is_empty() {
            sections.push(def.persona.clone());
        }
        if !def.must.is_empty() {
            sections.push(format!("## You must\n\n{}", bullets(&def.must)));
        }
        if !def.must_not.is_empty() {
            sections.push(format!("## You must not\n\n{}", bullets(&def.must_not)));
        }
        for &input in &def.inputs {
            let body = if waived.contains(&input) {
                "_Not available: the optional agent responsible for this stage failed. \
                 Proceed without it._"
                    .to_string()
            } else {
                self.store.get(input)?.content.trim_end().to_string()
            };
            sections.push(format!("## Input: {}\n\n{body}", input.filename()));
        }
        sections.push(format!(
            "## Output\n\nWrite the complete `{}` ({}) as markdown to stdout. \
             Do not add YAML front matter; relay records provenance itself.",
            def.output.filename(),
            def.output
        ));
        Ok(sections.join("\n\n") + "\n")
    }
}

fn bullets(items: &[String]) -> String {
    items
        .iter()
        .map(|i| format!("- {i}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn missing_inputs(def: &AgentDefinition, satisfied: &BTreeSet<Stage>) -> Vec<String> {
    def.inputs
        .iter()
        .filter(|s| !satisfied.contains(s))
        .map(|s| s.filename())
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
