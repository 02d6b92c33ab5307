//! Dependency graph and scheduler for one preset.
//!
//! `DependencyGraph::build` proves a preset is runnable before anything
//! executes: agents resolve, the producer → consumer graph is acyclic,
//! parallel phases are self-contained, and every input has exactly one
//! upstream producer. `next_ready` then answers "what may run now?" from the
//! set of satisfied stages alone, so it is idempotent and resumable.

use crate::agent::AgentDefinition;
use crate::error::{RelayError, Result};
use crate::preset::WorkflowPreset;
use crate::registry::AgentRegistry;
use crate::types::{PhaseMode, Stage};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap, HashSet};

// ---------------------------------------------------------------------------
// Plan types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct PlannedPhase {
    /// 1-based position in the preset.
    pub ordinal: usize,
    pub mode: PhaseMode,
    /// Concrete agent names (after substitutions), in declared order.
    pub agents: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct DependencyGraph {
    preset: WorkflowPreset,
    phases: Vec<PlannedPhase>,
    agents: HashMap<String, AgentDefinition>,
    /// producer → consumer
    edges: Vec<(String, String)>,
}

impl DependencyGraph {
    pub fn build(preset: &WorkflowPreset, registry: &AgentRegistry) -> Result<Self> {
        let invalid = |agent: &str, reason: String| RelayError::InvalidDefinition {
            agent: agent.to_string(),
            reason,
        };

        // -- Resolve agents --

        let mut phases = Vec::with_capacity(preset.phases.len());
        let mut agents: HashMap<String, AgentDefinition> = HashMap::new();
        let mut order: Vec<String> = Vec::new();

        for (i, phase) in preset.phases.iter().enumerate() {
            if phase.agents.is_empty() {
                return Err(invalid(&preset.name, format!("phase {} has no agents", i + 1)));
            }
            let mut names = Vec::with_capacity(phase.agents.len());
            for declared in &phase.agents {
                let name = preset.effective(declared);
                let def = registry.resolve(name)?;
                if name != declared {
                    let original = registry.resolve(declared)?;
                    if original.output != def.output {
                        return Err(invalid(
                            name,
                            format!(
                                "substitutes '{declared}' but writes {} instead of {}",
                                def.output, original.output
                            ),
                        ));
                    }
                }
                if agents.insert(name.to_string(), def.clone()).is_some() {
                    return Err(invalid(name, "appears more than once in the preset".into()));
                }
                order.push(name.to_string());
                names.push(name.to_string());
            }
            phases.push(PlannedPhase {
                ordinal: i + 1,
                mode: phase.mode,
                agents: names,
            });
        }
        if phases.is_empty() {
            return Err(invalid(&preset.name, "preset has no phases".into()));
        }
        for original in preset.substitutions.keys() {
            if !preset.phases.iter().any(|p| p.agents.contains(original)) {
                return Err(invalid(
                    original,
                    format!("substitution target is not part of preset '{}'", preset.name),
                ));
            }
        }

        // -- Edges + cycle check (Kahn's algorithm) --

        let mut edges = Vec::new();
        for consumer in &order {
            for input in &agents[consumer].inputs {
                for producer in &order {
                    if agents[producer].output == *input {
                        edges.push((producer.clone(), consumer.clone()));
                    }
                }
            }
        }
        check_acyclic(&order, &edges)?;

        // -- Parallel groups --

        let mut produced_before: HashSet<Stage> = HashSet::new();
        for phase in &phases {
            if phase.mode == PhaseMode::Parallel {
                let mut outputs: HashMap<Stage, &str> = HashMap::new();
                for name in &phase.agents {
                    let def = &agents[name];
                    if let Some(other) = outputs.insert(def.output, name) {
                        return Err(RelayError::InvalidParallelGroup {
                            phase: phase.ordinal,
                            reason: format!(
                                "'{other}' and '{name}' both write {}",
                                def.output
                            ),
                        });
                    }
                    if let Some(missing) =
                        def.inputs.iter().find(|s| !produced_before.contains(s))
                    {
                        return Err(RelayError::InvalidParallelGroup {
                            phase: phase.ordinal,
                            reason: format!(
                                "'{name}' needs {missing}, which no earlier phase produces"
                            ),
                        });
                    }
                }
            }
            produced_before.extend(phase.agents.iter().map(|n| agents[n].output));
        }

        // -- Whole-preset consistency --

        let mut producer_of: HashMap<Stage, &str> = HashMap::new();
        for name in &order {
            registry.validate(&agents[name])?;
            if let Some(other) = producer_of.insert(agents[name].output, name) {
                return Err(invalid(
                    name,
                    format!("{} is already produced by '{other}'", agents[name].output),
                ));
            }
        }

        let mut available: HashSet<Stage> = HashSet::new();
        for phase in &phases {
            // Parallel members only see earlier phases; sequential members
            // also see the members declared before them.
            let phase_start = available.clone();
            for name in &phase.agents {
                let def = &agents[name];
                let visible = match phase.mode {
                    PhaseMode::Parallel => &phase_start,
                    PhaseMode::Sequential => &available,
                };
                if let Some(missing) = def.inputs.iter().find(|s| !visible.contains(s)) {
                    return Err(invalid(
                        name,
                        format!("input {missing} is not produced earlier in preset '{}'", preset.name),
                    ));
                }
                available.insert(def.output);
            }
        }

        for check in &preset.checks {
            if !producer_of.contains_key(&check.stage) {
                return Err(invalid(
                    &preset.name,
                    format!("check targets {} but no agent produces it", check.stage),
                ));
            }
        }

        Ok(Self {
            preset: preset.clone(),
            phases,
            agents,
            edges,
        })
    }

    pub fn preset(&self) -> &WorkflowPreset {
        &self.preset
    }

    pub fn phases(&self) -> &[PlannedPhase] {
        &self.phases
    }

    pub fn edges(&self) -> &[(String, String)] {
        &self.edges
    }

    pub fn agent(&self, name: &str) -> Result<&AgentDefinition> {
        self.agents
            .get(name)
            .ok_or_else(|| RelayError::UnknownAgent(name.to_string()))
    }

    /// All agents in execution order.
    pub fn agents(&self) -> impl Iterator<Item = &AgentDefinition> {
        self.phases
            .iter()
            .flat_map(|p| p.agents.iter())
            .map(|n| &self.agents[n])
    }

    // -----------------------------------------------------------------------
    // Scheduling
    // -----------------------------------------------------------------------

    /// Agents that may be dispatched now.
    ///
    /// Looks only at the earliest phase with unsatisfied work. A sequential
    /// phase yields at most its first pending member; a parallel phase yields
    /// every pending member whose inputs are satisfied. The declared mode
    /// wins even when the graph would allow more concurrency.
    pub fn next_ready(&self, satisfied: &BTreeSet<Stage>) -> Vec<String> {
        let is_ready = |def: &AgentDefinition| def.inputs.iter().all(|s| satisfied.contains(s));

        for phase in &self.phases {
            let mut pending = phase
                .agents
                .iter()
                .map(|n| &self.agents[n])
                .filter(|d| !satisfied.contains(&d.output))
                .peekable();
            if pending.peek().is_none() {
                continue;
            }
            return match phase.mode {
                PhaseMode::Sequential => pending
                    .next()
                    .filter(|d| is_ready(d))
                    .map(|d| d.name.clone())
                    .into_iter()
                    .collect(),
                PhaseMode::Parallel => pending
                    .filter(|d| is_ready(d))
                    .map(|d| d.name.clone())
                    .collect(),
            };
        }
        Vec::new()
    }

    /// Agents whose output is not yet satisfied, in execution order.
    pub fn pending(&self, satisfied: &BTreeSet<Stage>) -> Vec<&AgentDefinition> {
        self.agents()
            .filter(|d| !satisfied.contains(&d.output))
            .collect()
    }

    pub fn is_complete(&self, satisfied: &BTreeSet<Stage>) -> bool {
        self.agents().all(|d| satisfied.contains(&d.output))
    }
}

fn check_acyclic(order: &[String], edges: &[(String, String)]) -> Result<()> {
    let mut in_degree: HashMap<&str, usize> = order.iter().map(|n| (n.as_str(), 0)).collect();
    let mut adj: HashMap<&str, Vec<&str>> = HashMap::new();
    for (producer, consumer) in edges {
        adj.entry(producer.as_str()).or_default().push(consumer.as_str());
        *in_degree.entry(consumer.as_str()).or_insert(0) += 1;
    }

    let mut queue: Vec<&str> = in_degree
        .iter()
        .filter(|(_, &deg)| deg == 0)
        .map(|(name, _)| *name)
        .collect();
    let mut visited = 0;

    while let Some(name) = queue.pop() {
        visited += 1;
        for dependent in adj.get(name).into_iter().flatten() {
            if let Some(deg) = in_degree.get_mut(dependent) {
                *deg -= 1;
                if *deg == 0 {
                    queue.push(dependent);
                }
            }
        }
    }

    if visited < order.len() {
        let mut cycled: Vec<String> = in_degree
            .into_iter()
            .filter(|(_, deg)| *deg > 0)
            .map(|(name, _)| name.to_string())
            .collect();
        cycled.sort();
        return Err(RelayError::CyclicDependency(cycled));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preset::{PhaseDef, PresetRegistry};
    use Stage::*;

    fn webapp() -> DependencyGraph {
        PresetRegistry::builtin()
            .graph("webapp", &AgentRegistry::builtin())
            .unwrap()
    }

    fn stages(list: &[Stage]) -> BTreeSet<Stage> {
        list.iter().copied().collect()
    }

    #[test]
    fn empty_store_starts_with_interviewer() {
        assert_eq!(webapp().next_ready(&BTreeSet::new()), vec!["interviewer"]);
    }

    #[test]
    fn discovery_done_releases_parallel_phase() {
        let ready = webapp().next_ready(&stages(&[Requirements, Wireframes, UxSpecification]));
        assert_eq!(
            ready,
            vec!["client-tech-architect", "mermaid-designer", "interactive-designer"]
        );
    }

    #[test]
    fn design_done_releases_planner_only() {
        let ready = webapp().next_ready(&stages(&[
            Requirements,
            Wireframes,
            UxSpecification,
            TechArchitecture,
            FlowDiagrams,
            Animations,
        ]));
        assert_eq!(ready, vec!["planner"]);
    }

    #[test]
    fn parallel_phase_shrinks_as_members_finish() {
        let ready = webapp().next_ready(&stages(&[
            Requirements,
            Wireframes,
            UxSpecification,
            FlowDiagrams,
        ]));
        assert_eq!(ready, vec!["client-tech-architect", "interactive-designer"]);
    }

    #[test]
    fn next_ready_is_idempotent() {
        let graph = webapp();
        let satisfied = stages(&[Requirements, Wireframes]);
        assert_eq!(graph.next_ready(&satisfied), graph.next_ready(&satisfied));
        assert_eq!(graph.next_ready(&satisfied), vec!["ux-writer"]);
    }

    #[test]
    fn sequential_declaration_beats_graph_parallelism() {
        // planner and browser-qa are sequential; with everything but the
        // roadmap present only planner may run.
        let graph = webapp();
        let mut satisfied = stages(Stage::all());
        satisfied.remove(&Roadmap);
        satisfied.remove(&QaReport);
        assert_eq!(graph.next_ready(&satisfied), vec!["planner"]);
    }

    #[test]
    fn complete_when_every_output_satisfied() {
        let graph = webapp();
        let all = stages(Stage::all());
        assert!(graph.is_complete(&all));
        assert!(graph.next_ready(&all).is_empty());
        assert_eq!(graph.pending(&BTreeSet::new()).len(), 8);
    }

    #[test]
    fn every_output_has_exactly_one_producer() {
        let agents = AgentRegistry::builtin();
        let presets = PresetRegistry::builtin();
        for preset in presets.list() {
            let graph = presets.graph(&preset.name, &agents).unwrap();
            let outputs: Vec<Stage> = graph.agents().map(|d| d.output).collect();
            let unique: BTreeSet<Stage> = outputs.iter().copied().collect();
            assert_eq!(outputs.len(), unique.len(), "{}", preset.name);
        }
    }

    #[test]
    fn substitutions_fill_the_same_slot() {
        let graph = PresetRegistry::builtin()
            .graph("mobile-web", &AgentRegistry::builtin())
            .unwrap();
        assert_eq!(graph.next_ready(&stages(&[Requirements])), vec!["mobile-ui-sketcher"]);
        assert_eq!(
            graph.next_ready(&stages(&[Requirements, Wireframes, UxSpecification])),
            vec!["pwa-architect", "mermaid-designer", "mobile-interaction-designer"]
        );
    }

    #[test]
    fn substitution_with_different_output_is_invalid() {
        let preset = WorkflowPreset::standard("bad", "").substitute("ui-sketcher", "planner");
        let err = DependencyGraph::build(&preset, &AgentRegistry::builtin()).unwrap_err();
        assert!(matches!(err, RelayError::InvalidDefinition { .. }), "got {err}");
    }

    #[test]
    fn unknown_agent_in_phase() {
        let preset = WorkflowPreset::new("x", "").phase(PhaseDef::sequential(&["ghostwriter"]));
        let err = DependencyGraph::build(&preset, &AgentRegistry::builtin()).unwrap_err();
        assert!(matches!(err, RelayError::UnknownAgent(ref n) if n == "ghostwriter"));
    }

    #[test]
    fn cycle_is_rejected() {
        let mut agents = AgentRegistry::new();
        agents
            .register(AgentDefinition::new("a", Requirements).with_inputs(&[Wireframes]))
            .unwrap();
        agents
            .register(AgentDefinition::new("b", Wireframes).with_inputs(&[Requirements]))
            .unwrap();
        let preset = WorkflowPreset::new("loop", "").phase(PhaseDef::sequential(&["a", "b"]));
        let err = DependencyGraph::build(&preset, &agents).unwrap_err();
        match err {
            RelayError::CyclicDependency(names) => assert_eq!(names, vec!["a", "b"]),
            other => panic!("expected cycle, got {other}"),
        }
    }

    #[test]
    fn parallel_member_reading_sibling_output_is_rejected() {
        let preset = WorkflowPreset::new("eager", "")
            .phase(PhaseDef::sequential(&["interviewer"]))
            .phase(PhaseDef::parallel(&["ui-sketcher", "ux-writer"]));
        let err = DependencyGraph::build(&preset, &AgentRegistry::builtin()).unwrap_err();
        assert!(
            matches!(err, RelayError::InvalidParallelGroup { phase: 2, .. }),
            "got {err}"
        );
    }

    #[test]
    fn sequential_member_before_its_producer_is_rejected() {
        let preset = WorkflowPreset::new("backwards", "")
            .phase(PhaseDef::sequential(&["interviewer", "ux-writer", "ui-sketcher"]));
        let err = DependencyGraph::build(&preset, &AgentRegistry::builtin()).unwrap_err();
        assert!(matches!(err, RelayError::InvalidDefinition { ref agent, .. } if agent == "ux-writer"));
    }

    #[test]
    fn duplicate_output_across_phases_is_rejected() {
        let preset = WorkflowPreset::new("twice", "")
            .phase(PhaseDef::sequential(&["interviewer", "ui-sketcher"]))
            .phase(PhaseDef::sequential(&["mobile-ui-sketcher"]));
        let err = DependencyGraph::build(&preset, &AgentRegistry::builtin()).unwrap_err();
        assert!(err.to_string().contains("already produced"), "got {err}");
    }

    #[test]
    fn empty_phase_is_rejected() {
        let preset = WorkflowPreset::new("hollow", "").phase(PhaseDef::parallel(&[]));
        assert!(DependencyGraph::build(&preset, &AgentRegistry::builtin()).is_err());
    }
}
