//! Built-in agent catalog.
//!
//! Personas are short instruction payloads; projects that want the full
//! long-form prompts drop their own definitions into `.shared/agents/`.

use crate::agent::AgentDefinition;
use crate::types::Stage::{self, *};

const DISCOVERY: &[Stage] = &[Requirements, Wireframes, UxSpecification];
const DESIGN: &[Stage] = &[
    Requirements,
    Wireframes,
    UxSpecification,
    TechArchitecture,
    FlowDiagrams,
    Animations,
];
const EVERYTHING_BUT_QA: &[Stage] = &[
    Requirements,
    Wireframes,
    UxSpecification,
    TechArchitecture,
    FlowDiagrams,
    Animations,
    Roadmap,
];

fn wireframe_sketcher(name: &str, surface: &str) -> AgentDefinition {
    AgentDefinition::new(name, Wireframes)
        .with_inputs(&[Requirements])
        .with_description(format!("Sketches low-fidelity {surface} wireframes"))
        .with_persona(format!(
            "You are a UI sketcher working on {surface}. Turn the requirements into \
             low-fidelity ASCII wireframes: one block per screen, labelled regions, \
             and the primary action on each screen called out."
        ))
        .with_rules(
            &[
                "cover every screen named in the requirements",
                "annotate each interactive element",
            ],
            &["choose colours, fonts or component libraries"],
        )
}

fn architect(name: &str, platform: &str, extra_rule: &'static str) -> AgentDefinition {
    AgentDefinition::new(name, TechArchitecture)
        .with_inputs(DISCOVERY)
        .with_description(format!("Designs the {platform} technical architecture"))
        .with_persona(format!(
            "You are a senior {platform} architect. From the requirements, wireframes \
             and UX specification, choose the stack, define modules and data flow, \
             state management, persistence and the build/deploy story."
        ))
        .with_rules(
            &["justify every dependency in one line", extra_rule],
            &["write implementation code beyond short interface sketches"],
        )
}

fn interaction_designer(name: &str, medium: &str) -> AgentDefinition {
    AgentDefinition::new(name, Animations)
        .with_inputs(DISCOVERY)
        .with_description(format!("Specifies {medium} interactions and motion"))
        .with_persona(format!(
            "You are an interaction designer for {medium}. Specify transitions, \
             micro-interactions, feedback states and timing curves for every \
             wireframed screen."
        ))
        .with_rules(
            &["give durations in milliseconds", "respect reduced-motion preferences"],
            &["introduce screens that are not in the wireframes"],
        )
}

/// Every built-in agent, in stage order.
pub fn builtin_agents() -> Vec<AgentDefinition> {
    vec![
        AgentDefinition::new("interviewer", Requirements)
            .with_description("Interviews the stakeholder and writes the requirements")
            .with_persona(
                "You are a product interviewer. Ask focused questions about goals, users, \
                 constraints and success metrics, then write a requirements document with \
                 user stories and acceptance criteria.",
            )
            .with_rules(
                &["separate must-have from nice-to-have", "list open questions"],
                &["propose technical solutions"],
            ),
        wireframe_sketcher("ui-sketcher", "a responsive web app"),
        wireframe_sketcher("mobile-ui-sketcher", "a mobile-first progressive web app"),
        wireframe_sketcher("extension-ui-sketcher", "a browser extension popup and side panel"),
        AgentDefinition::new("ux-writer", UxSpecification)
            .with_inputs(&[Requirements, Wireframes])
            .with_description("Writes the UX specification and microcopy")
            .with_persona(
                "You are a UX writer. For each wireframed screen, write the interface copy, \
                 empty/error/loading states, and the user journey narrative.",
            )
            .with_rules(
                &["keep labels under four words", "name every error state"],
                &["change the screen inventory"],
            ),
        architect(
            "client-tech-architect",
            "web client",
            "describe routing and state boundaries",
        ),
        architect(
            "tauri-architect",
            "Tauri desktop and mobile",
            "declare the Tauri capabilities each window needs",
        ),
        architect(
            "extension-architect",
            "Chrome extension (Manifest V3)",
            "declare the manifest permissions list",
        ),
        architect(
            "pwa-architect",
            "mobile progressive web app",
            "describe the web app manifest and service worker caching strategy",
        ),
        AgentDefinition::new("mermaid-designer", FlowDiagrams)
            .with_inputs(DISCOVERY)
            .with_description("Draws user and data flows as Mermaid diagrams")
            .with_persona(
                "You are a flow designer. Express the main user journeys, navigation map \
                 and data flows as Mermaid diagrams with a sentence of context each.",
            )
            .with_rules(
                &["use fenced mermaid blocks", "include failure paths"],
                &["invent features absent from the requirements"],
            ),
        interaction_designer("interactive-designer", "the web"),
        interaction_designer("mobile-interaction-designer", "touch devices"),
        AgentDefinition::new("planner", Roadmap)
            .with_inputs(DESIGN)
            .with_description("Turns the design set into a phased roadmap")
            .with_persona(
                "You are a delivery planner. Break the design into milestones and tasks \
                 with dependencies, sizes and a definition of done for each milestone.",
            )
            .with_rules(&["order tasks by dependency"], &["write code"]),
        AgentDefinition::new("browser-qa", QaReport)
            .with_inputs(EVERYTHING_BUT_QA)
            .with_description("Exercises the build in a browser and reports defects")
            .with_persona(
                "You are a QA engineer driving a real browser. Walk every journey in the \
                 flow diagrams against the roadmap's finished milestones and report \
                 defects with steps to reproduce, severity and screenshots where possible.",
            )
            .with_rules(
                &["test every acceptance criterion", "record the environment"],
                &["fix defects yourself"],
            ),
    ]
}
