//! In-memory executor for runner tests.

use crate::executor::{AgentRequest, Executor, ExecutorError};
use futures::future::BoxFuture;
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

enum Script {
    Reply(String),
    Fail,
}

/// Answers `# {agent} output` unless told otherwise. Records every call.
#[derive(Default)]
pub struct ScriptedExecutor {
    scripts: Mutex<HashMap<String, VecDeque<Script>>>,
    always_fail: BTreeSet<String>,
    hang: BTreeSet<String>,
    waits: HashMap<String, String>,
    timeout: Option<Duration>,
    calls: Mutex<Vec<(String, String)>>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, agent: &str, text: &str) -> Self {
        self.push(agent, Script::Reply(text.to_string()))
    }

    pub fn fail_times(mut self, agent: &str, times: usize) -> Self {
        for _ in 0..times {
            self = self.push(agent, Script::Fail);
        }
        self
    }

    pub fn always_fail(mut self, agent: &str) -> Self {
        self.always_fail.insert(agent.to_string());
        self
    }

    /// Calls for `agent` never complete.
    pub fn hang(mut self, agent: &str) -> Self {
        self.hang.insert(agent.to_string());
        self
    }

    /// Calls for `agent` complete only once `other` has been called.
    pub fn wait_for(mut self, agent: &str, other: &str) -> Self {
        self.waits.insert(agent.to_string(), other.to_string());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn push(self, agent: &str, script: Script) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .entry(agent.to_string())
            .or_default()
            .push_back(script);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(agent, _)| agent.clone())
            .collect()
    }

    pub fn calls_for(&self, agent: &str) -> usize {
        self.calls().iter().filter(|a| *a == agent).count()
    }

    /// Prompt of the most recent call for `agent`.
    pub fn prompt_for(&self, agent: &str) -> Option<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(a, _)| a == agent)
            .map(|(_, prompt)| prompt.clone())
    }
}

impl Executor for ScriptedExecutor {
    fn execute<'a>(
        &'a self,
        request: &'a AgentRequest,
    ) -> BoxFuture<'a, Result<String, ExecutorError>> {
        self.calls
            .lock()
            .unwrap()
            .push((request.agent.clone(), request.prompt.clone()));

        let scripted = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&request.agent)
            .and_then(|queue| queue.pop_front());

        Box::pin(async move {
            if self.hang.contains(&request.agent) {
                std::future::pending::<()>().await;
            }
            if let Some(other) = self.waits.get(&request.agent) {
                while self.calls_for(other) == 0 {
                    tokio::time::sleep(Duration::from_millis(1)).await;
                }
            }
            let fail = || ExecutorError::Exit {
                code: 1,
                stderr: format!("{} crashed", request.agent),
            };
            match scripted {
                Some(Script::Reply(text)) => Ok(text),
                Some(Script::Fail) => Err(fail()),
                None if self.always_fail.contains(&request.agent) => Err(fail()),
                None => Ok(format!("# {} output\n", request.agent)),
            }
        })
    }

    fn timeout(&self, _agent: &str) -> Option<Duration> {
        self.timeout
    }
}
