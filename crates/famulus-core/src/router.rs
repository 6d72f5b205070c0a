//! The top-level desk agent: resolves tasks into dispatched actions,
//! brackets dispatches with session bookkeeping, and records every
//! exchange in the memory service.

use famulus_types::{
    DiagnoseParams, Directive, InteractionChannel, NewInteraction, OpOutcome, TaskContext,
    TaskRequest,
};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::agent::{Agent, ShelfLife};
use crate::llm::LanguageModel;
use crate::memory::{LearnSample, MemoryService};
use crate::ops::{ConsoleOps, DirOps, ExternalOps, FileOps, NetOps, SystemOps, WorkflowOps};
use crate::Result;

const USER_AGENT: &str = "famulus-desk-agent";

/// Construction parameters for [`DeskAgent`].
#[derive(Debug, Clone)]
pub struct DeskAgentConfig {
    /// Shelf-life cap for supervised runs.
    pub max_runs: u32,
    /// Default remote graph source for diagnostics and syncs.
    pub remote_memory_url: Option<String>,
    /// Local anonymizing-proxy defaults for diagnostics.
    pub proxy_host: String,
    pub proxy_port: u16,
}

impl Default for DeskAgentConfig {
    fn default() -> Self {
        Self {
            max_runs: 3,
            remote_memory_url: None,
            proxy_host: "127.0.0.1".to_string(),
            proxy_port: 9050,
        }
    }
}

/// Autonomous desk agent: composes the lifecycle base with the memory
/// service and the capability modules.
pub struct DeskAgent {
    shelf: ShelfLife,
    llm: Box<dyn LanguageModel>,
    memory: Arc<MemoryService>,
    files: FileOps,
    dirs: DirOps,
    system: SystemOps,
    network: NetOps,
    external: ExternalOps,
    workflows: WorkflowOps,
    console: Option<ConsoleOps>,
    console_absence: Option<String>,
    config: DeskAgentConfig,
    current_session: Option<String>,
}

impl DeskAgent {
    /// Wire the agent. The console subsystem may be unavailable (headless
    /// host); its absence is recorded, not fatal.
    pub fn new(
        config: DeskAgentConfig,
        llm: Box<dyn LanguageModel>,
        memory: Arc<MemoryService>,
    ) -> Result<Self> {
        let shelf = ShelfLife::new(config.max_runs)?;

        let (console, console_absence) = match ConsoleOps::new() {
            Ok(console) => (Some(console), None),
            Err(e) => {
                warn!(target: "famulus::router", cause = %e, "console subsystem disabled");
                (None, Some(e.to_string()))
            }
        };

        Ok(Self {
            shelf,
            llm,
            memory,
            files: FileOps,
            dirs: DirOps,
            system: SystemOps,
            network: NetOps::new(),
            external: ExternalOps,
            workflows: WorkflowOps::new(),
            console,
            console_absence,
            config,
            current_session: None,
        })
    }

    /// Token of the active session, if one is open.
    pub fn session_id(&self) -> Option<&str> {
        self.current_session.as_deref()
    }

    pub fn memory(&self) -> &Arc<MemoryService> {
        &self.memory
    }

    pub fn files(&self) -> &FileOps {
        &self.files
    }

    pub fn dirs(&self) -> &DirOps {
        &self.dirs
    }

    pub fn system(&self) -> &SystemOps {
        &self.system
    }

    pub fn network(&self) -> &NetOps {
        &self.network
    }

    pub fn external(&self) -> &ExternalOps {
        &self.external
    }

    pub fn workflows(&mut self) -> &mut WorkflowOps {
        &mut self.workflows
    }

    fn ensure_session(&mut self) -> Result<String> {
        if let Some(session) = &self.current_session {
            return Ok(session.clone());
        }
        let session = self.memory.start_session(Some(USER_AGENT), None)?;
        debug!(target: "famulus::router", session = %session, "session opened");
        self.current_session = Some(session.clone());
        Ok(session)
    }

    /// Close the active session. Safe to call with no session open.
    pub fn end_session(&mut self) -> Result<()> {
        if let Some(session) = self.current_session.take() {
            self.memory.end_session(&session)?;
            debug!(target: "famulus::router", session = %session, "session closed");
        }
        Ok(())
    }

    fn dispatch_directive(&mut self, directive: &Directive) -> Result<String> {
        match directive {
            Directive::ShowConsole => Ok(match (&self.console, &self.console_absence) {
                (Some(console), _) => console.launch().message,
                (None, Some(cause)) => format!("Interactive console unavailable: {cause}"),
                (None, None) => "Interactive console unavailable".to_string(),
            }),
            Directive::SelfDiagnose(params) => self.self_diagnose(params),
            Directive::SyncGraph { url, force } => {
                let report = self.memory.sync_remote_graph(url.as_deref(), *force)?;
                Ok(if report.success {
                    report
                        .message
                        .unwrap_or_else(|| format!("Synced {} edges", report.synced_count))
                } else {
                    format!(
                        "Graph sync failed: {}",
                        report.error.unwrap_or_else(|| "unknown error".to_string())
                    )
                })
            }
            Directive::QueryGraph {
                source,
                target,
                edge_type,
            } => self.query_remote_graph(source.as_deref(), target.as_deref(), edge_type.as_deref()),
            Directive::ProjectContext { project } => self.project_context_report(project),
            Directive::WorkspaceOverview => self.workspace_overview_report(),
            Directive::TrainFromHistory { days_back } => {
                let report = self.memory.train_from_history(*days_back)?;
                Ok(format!(
                    "Processed {} interactions over {} days, {} carried action patterns",
                    report.interactions_processed,
                    report.training_period_days,
                    report.patterns_learned
                ))
            }
            Directive::MemoryStats => {
                let stats = self.memory.get_stats()?;
                Ok(format!(
                    "Interactions: {} total, {} today; active sessions: {}; knowledge entries: {}",
                    stats.total_interactions,
                    stats.recent_interactions,
                    stats.active_sessions,
                    stats.knowledge_entries
                ))
            }
            Directive::EndSession => {
                self.end_session()?;
                Ok("Session closed".to_string())
            }
        }
    }

    /// Route free text through precedent and graph context to the model.
    fn route_text(&mut self, text: &str) -> Result<String> {
        let mut prompt = String::new();

        match self.memory.get_learning_context(text, 5) {
            Ok(precedents) if !precedents.is_empty() => {
                prompt.push_str("Relevant past exchanges:\n");
                for precedent in &precedents {
                    if let (Some(input), Some(response)) =
                        (&precedent.user_input, &precedent.agent_response)
                    {
                        let preview: String = response.chars().take(160).collect();
                        prompt.push_str(&format!("- {input} => {preview}\n"));
                    }
                }
                prompt.push('\n');
            }
            Ok(_) => {}
            Err(e) => warn!(target: "famulus::router", error = %e, "precedent lookup failed"),
        }

        if let Some(graph) = self.graph_context(text) {
            prompt.push_str(&graph);
            prompt.push('\n');
        }

        prompt.push_str(&format!("Task: {text}\n"));
        self.llm.generate(&prompt, 512, 0.2)
    }

    /// Opportunistic graph context when the input mentions the workspace
    /// or a known project.
    fn graph_context(&self, text: &str) -> Option<String> {
        let lowered = text.to_lowercase();
        let overview = self.memory.get_workspace_overview().ok()?;
        if overview.is_empty() {
            return None;
        }

        if lowered.contains("workspace") {
            return self.workspace_overview_report().ok();
        }

        for group in overview.values() {
            for project in &group.projects {
                let short = project.strip_prefix("project_").unwrap_or(project);
                if !short.is_empty() && lowered.contains(&short.to_lowercase()) {
                    return self.project_context_report(short).ok();
                }
            }
        }
        None
    }

    /// Formatted view over the cached graph edges.
    pub fn query_remote_graph(
        &self,
        source: Option<&str>,
        target: Option<&str>,
        edge_type: Option<&str>,
    ) -> Result<String> {
        let edges = self
            .memory
            .get_remote_graph_edges(source, target, edge_type)?;
        if edges.is_empty() {
            return Ok("No matching edges found in remote graph".to_string());
        }

        let mut report = format!("Found {} edges:\n", edges.len());
        for edge in edges.iter().take(20) {
            report.push_str(&format!(
                "- {} --({})--> {}",
                edge.source, edge.edge_type, edge.target
            ));
            if let Some(strength) = &edge.strength {
                report.push_str(&format!(" [strength: {strength}]"));
            }
            if let Some(purpose) = &edge.purpose {
                report.push_str(&format!(" [purpose: {purpose}]"));
            }
            report.push('\n');
        }
        if edges.len() > 20 {
            report.push_str(&format!("... and {} more", edges.len() - 20));
        }
        Ok(report)
    }

    /// Human-readable project context.
    pub fn project_context_report(&self, project: &str) -> Result<String> {
        let context = self.memory.get_project_context(project)?;

        let mut report = format!("Project context for '{project}':\n");
        report.push_str(&format!(
            "  Workspace: {}\n",
            context.workspace.as_deref().unwrap_or("unknown")
        ));
        if let Some(purpose) = &context.purpose {
            report.push_str(&format!("  Purpose: {purpose}\n"));
        }
        report.push_str(&format!(
            "  Related projects: {}\n",
            if context.related_projects.is_empty() {
                "none".to_string()
            } else {
                context.related_projects.join(", ")
            }
        ));
        if !context.resources.is_empty() {
            report.push_str("  Resources:\n");
            for resource in &context.resources {
                report.push_str(&format!("    - {}", resource.resource));
                if let Some(purpose) = &resource.purpose {
                    report.push_str(&format!(" (purpose: {purpose})"));
                }
                report.push('\n');
            }
        }
        if !context.configurations.is_empty() {
            report.push_str(&format!(
                "  Configurations: {}\n",
                context.configurations.join(", ")
            ));
        }
        Ok(report.trim_end().to_string())
    }

    /// Human-readable overview of every cached workspace.
    pub fn workspace_overview_report(&self) -> Result<String> {
        let overview = self.memory.get_workspace_overview()?;
        if overview.is_empty() {
            return Ok("Workspace overview: no workspaces cached".to_string());
        }

        let mut report = String::from("Workspace overview:\n");
        for (workspace, group) in &overview {
            report.push_str(&format!("\n{workspace}:\n"));
            report.push_str(&format!("  Projects: {}\n", group.projects.join(", ")));
            if !group.configurations.is_empty() {
                report.push_str(&format!(
                    "  Configurations: {}\n",
                    group.configurations.join(", ")
                ));
            }
        }
        Ok(report.trim_end().to_string())
    }

    /// Read-only health sweep. Every sub-check is contained so one failing
    /// check cannot abort the rest; the combined report is logged as an
    /// internal interaction.
    pub fn self_diagnose(&mut self, params: &DiagnoseParams) -> Result<String> {
        // Resolve every optional parameter before the first check runs.
        let proxy_host = params
            .proxy_host
            .clone()
            .unwrap_or_else(|| self.config.proxy_host.clone());
        let proxy_port = params.proxy_port.unwrap_or(self.config.proxy_port);
        let proxied_url = params.proxied_url.clone();
        let remote_url = params
            .remote_memory_url
            .clone()
            .or_else(|| self.config.remote_memory_url.clone());

        let mut results = Vec::new();

        // 1. Host state.
        results.push(format!("System info: {}", self.system.system_info().message));

        // 2. Memory service stats and backing file.
        match self.memory.get_stats() {
            Ok(stats) => {
                results.push(format!(
                    "Memory service: {} interactions, {} active sessions, {} knowledge entries",
                    stats.total_interactions, stats.active_sessions, stats.knowledge_entries
                ));
                let db_path = self.memory.db_path();
                results.push(format!(
                    "Memory db: {} exists={}",
                    db_path.display(),
                    db_path.exists()
                ));
            }
            Err(e) => results.push(format!("Memory service: ERROR - {e}")),
        }

        // 3. Language model reachability.
        match self.llm.generate("Ping: respond with OK", 5, 0.0) {
            Ok(reply) => results.push(format!(
                "Language model: reachable (sample response length {})",
                reply.len()
            )),
            Err(e) => results.push(format!("Language model: ERROR - {e}")),
        }

        // 4. Local anonymizing proxy.
        let probe = self
            .network
            .probe_proxy(&proxy_host, proxy_port, std::time::Duration::from_secs(2));
        results.push(format!(
            "Anonymizing proxy: {}",
            if probe.success { "detected" } else { "not detected" }
        ));

        // 5. Optional proxied endpoint test.
        if let Some(url) = &proxied_url {
            let outcome = self.network.fetch_via_proxy(url, &proxy_host, proxy_port);
            results.push(format!("Proxied memory server: {}", outcome.message));
            self.log_check(
                "self_diagnose",
                &format!("Proxied test to {url}"),
                &outcome.message,
                outcome.success,
            );
        }

        // 6. Optional remote memory server test, syncing the graph on
        // success.
        match &remote_url {
            Some(url) => {
                let fetch = self.memory.connect_to_remote_memory_server(url, 15);
                if fetch.success {
                    let payload_len = fetch
                        .data
                        .as_ref()
                        .map(|d| d.to_string().len())
                        .unwrap_or(0);
                    results.push(format!(
                        "Remote memory server: connected, payload length {payload_len}"
                    ));
                    match self.memory.sync_remote_graph(Some(url.as_str()), false) {
                        Ok(report) if report.success => results
                            .push(format!("Remote graph synced: {} edges", report.synced_count)),
                        Ok(report) => results.push(format!(
                            "Remote graph sync failed: {}",
                            report.error.unwrap_or_else(|| "unknown error".to_string())
                        )),
                        Err(e) => results.push(format!("Remote graph sync failed: {e}")),
                    }
                } else {
                    results.push(format!(
                        "Remote memory server: {}",
                        fetch.error.as_deref().unwrap_or("unreachable")
                    ));
                }
                self.log_check(
                    "self_diagnose",
                    &format!("Remote memory test to {url}"),
                    results.last().map(String::as_str).unwrap_or(""),
                    fetch.success,
                );
            }
            None => results.push(
                "Remote memory server: no URL provided; configure remote_memory_url or pass one"
                    .to_string(),
            ),
        }

        let report = results.join("\n");
        let mut row = NewInteraction::new(InteractionChannel::Internal, "self_diagnose")
            .input("self_diagnose")
            .response(&report);
        if let Some(session) = self.current_session.as_deref() {
            row = row.session(session);
        }
        self.memory.log_interaction(row)?;
        Ok(report)
    }

    /// Execute one structured action descriptor, bracketing it with
    /// session and interaction bookkeeping. The executed descriptor is
    /// recorded in the interaction's `actions_executed` payload.
    pub fn dispatch_action(&mut self, action: &Value, ctx: &TaskContext) -> Result<OpOutcome> {
        self.ensure_session()?;
        let outcome = self.execute_action(action);

        let input = action.to_string();
        let actions = [action.clone()];
        let mut row = NewInteraction::new(ctx.channel, "action")
            .input(&input)
            .response(&outcome.message)
            .actions(&actions);
        if !outcome.success {
            row = row.failed(&outcome.message);
        }
        if let Some(session) = self.current_session.as_deref() {
            row = row.session(session);
        }
        self.memory.log_interaction(row)?;

        if outcome.success {
            if let Err(e) = self.memory.learn_from_interaction(LearnSample {
                user_input: &input,
                agent_response: &outcome.message,
                success: true,
            }) {
                warn!(target: "famulus::router", error = %e, "learning pass failed");
            }
        }
        Ok(outcome)
    }

    /// Map an action descriptor onto the capability modules. Unknown
    /// actions come back as failure envelopes, never as errors.
    pub fn execute_action(&mut self, action: &Value) -> OpOutcome {
        let Some(name) = action.get("action").and_then(Value::as_str) else {
            return OpOutcome::fail("Action descriptor is missing an 'action' field");
        };
        let arg = |key: &str| {
            action
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_string()
        };

        match name {
            "create_file" => self.files.create_file(&arg("path"), &arg("content")),
            "read_file" => self.files.read_file(&arg("path")),
            "edit_file" => self.files.edit_file(&arg("path"), &arg("old"), &arg("new")),
            "delete_file" => self.files.delete_file(&arg("path")),
            "move_file" => self.files.move_file(&arg("source"), &arg("destination")),
            "copy_file" => self.files.copy_file(&arg("source"), &arg("destination")),
            "list_directory" => self.dirs.list_directory(&arg("path")),
            "create_directory" => self.dirs.create_directory(&arg("path")),
            "current_directory" => self.dirs.current_directory(),
            "run_command" => {
                let timeout = action
                    .get("timeout_secs")
                    .and_then(Value::as_u64)
                    .unwrap_or(60);
                self.system.run_command(&arg("command"), timeout)
            }
            "system_info" => self.system.system_info(),
            "http_get" => self.network.http_get(&arg("url")),
            "probe_proxy" => {
                let port = action
                    .get("port")
                    .and_then(Value::as_u64)
                    .unwrap_or(u64::from(self.config.proxy_port)) as u16;
                self.network
                    .probe_proxy(&arg("host"), port, std::time::Duration::from_secs(2))
            }
            "git_status" => self.external.git_status(&arg("path")),
            "git_clone" => self.external.git_clone(&arg("url"), &arg("destination")),
            "create_archive" => self.external.create_archive(&arg("source"), &arg("archive")),
            "extract_archive" => {
                self.external
                    .extract_archive(&arg("archive"), &arg("destination"))
            }
            "run_pipeline" => {
                let steps: Vec<String> = action
                    .get("steps")
                    .and_then(Value::as_array)
                    .map(|steps| {
                        steps
                            .iter()
                            .filter_map(Value::as_str)
                            .map(str::to_string)
                            .collect()
                    })
                    .unwrap_or_default();
                self.workflows.run_pipeline(&arg("name"), &steps)
            }
            other => OpOutcome::fail(format!("Unknown action: {other}")),
        }
    }

    /// Best-effort log of one diagnostic sub-check; a storage failure here
    /// must not abort the remaining checks.
    fn log_check(&self, method: &str, input: &str, response: &str, success: bool) {
        let mut row = NewInteraction::new(InteractionChannel::Internal, method)
            .input(input)
            .response(response);
        if !success {
            row = row.failed(response);
        }
        if let Some(session) = self.current_session.as_deref() {
            row = row.session(session);
        }
        if let Err(e) = self.memory.log_interaction(row) {
            warn!(target: "famulus::router", error = %e, "failed to log diagnostic check");
        }
    }
}

impl Agent for DeskAgent {
    fn name(&self) -> &str {
        "desk-agent"
    }

    fn shelf_life(&self) -> &ShelfLife {
        &self.shelf
    }

    fn shelf_life_mut(&mut self) -> &mut ShelfLife {
        &mut self.shelf
    }

    fn run(&mut self, task: &TaskRequest, ctx: &TaskContext) -> Result<String> {
        self.ensure_session()?;
        let input = task.describe();
        let method = match task {
            TaskRequest::Directive(_) => "action",
            TaskRequest::Text(_) => "chat",
        };

        let result = match task {
            TaskRequest::Directive(directive) => self.dispatch_directive(directive),
            TaskRequest::Text(text) => self.route_text(text),
        };

        match result {
            Ok(response) => {
                let mut row = NewInteraction::new(ctx.channel, method)
                    .input(&input)
                    .response(&response);
                if let Some(session) = self.current_session.as_deref() {
                    row = row.session(session);
                }
                self.memory.log_interaction(row)?;

                if let Err(e) = self.memory.learn_from_interaction(LearnSample {
                    user_input: &input,
                    agent_response: &response,
                    success: true,
                }) {
                    warn!(target: "famulus::router", error = %e, "learning pass failed");
                }
                Ok(response)
            }
            Err(e) => {
                let message = e.to_string();
                let mut row = NewInteraction::new(ctx.channel, method)
                    .input(&input)
                    .failed(&message);
                if let Some(session) = self.current_session.as_deref() {
                    row = row.session(session);
                }
                if let Err(log_err) = self.memory.log_interaction(row) {
                    warn!(
                        target: "famulus::router",
                        error = %log_err,
                        "failed to log dispatch failure"
                    );
                }
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryConfig;
    use crate::CoreError;
    use famulus_types::RunOutcome;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    struct StubLlm {
        calls: Arc<AtomicUsize>,
        reply: String,
        fail: bool,
    }

    impl LanguageModel for StubLlm {
        fn generate(&self, _prompt: &str, _max_tokens: u32, _temperature: f32) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(CoreError::LanguageModel("stub offline".to_string()))
            } else {
                Ok(self.reply.clone())
            }
        }
    }

    fn build_agent(fail_llm: bool) -> (DeskAgent, Arc<AtomicUsize>, TempDir) {
        let dir = TempDir::new().unwrap();
        let memory = Arc::new(
            MemoryService::open(MemoryConfig::new(dir.path().join("memory.db"))).unwrap(),
        );
        let calls = Arc::new(AtomicUsize::new(0));
        let llm = Box::new(StubLlm {
            calls: Arc::clone(&calls),
            reply: "stub says hello, this is a sufficiently long reply for learning".to_string(),
            fail: fail_llm,
        });
        let agent = DeskAgent::new(DeskAgentConfig::default(), llm, memory).unwrap();
        (agent, calls, dir)
    }

    #[test]
    fn test_directive_fast_path_bypasses_llm() {
        let (mut agent, calls, _dir) = build_agent(false);
        let outcome = agent.safe_run(
            &TaskRequest::Directive(Directive::MemoryStats),
            &TaskContext::default(),
        );

        match outcome {
            RunOutcome::Completed { response } => assert!(response.contains("Interactions")),
            other => panic!("expected completion, got {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(agent.session_id().is_some());

        // The dispatch itself was logged.
        let logged = agent.memory().get_recent_interactions(10, None).unwrap();
        assert_eq!(logged.len(), 1);
        assert_eq!(logged[0].method, "action");
    }

    #[test]
    fn test_free_text_routes_through_llm() {
        let (mut agent, calls, _dir) = build_agent(false);
        let outcome = agent.safe_run(
            &TaskRequest::Text("summarize my day".to_string()),
            &TaskContext::default(),
        );

        assert!(matches!(outcome, RunOutcome::Completed { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_llm_failure_is_logged_and_contained() {
        let (mut agent, _calls, _dir) = build_agent(true);
        let outcome = agent.safe_run(
            &TaskRequest::Text("anything".to_string()),
            &TaskContext::default(),
        );

        match outcome {
            RunOutcome::Failed { message } => assert!(message.contains("stub offline")),
            other => panic!("expected failure, got {other:?}"),
        }

        let logged = agent.memory().get_recent_interactions(10, None).unwrap();
        assert_eq!(logged.len(), 1);
        assert!(!logged[0].success);
        assert!(logged[0].error_message.is_some());
    }

    #[test]
    fn test_session_persists_across_runs_until_ended() {
        let (mut agent, _calls, _dir) = build_agent(false);
        let ctx = TaskContext::default();

        agent.safe_run(&TaskRequest::Directive(Directive::MemoryStats), &ctx);
        let session = agent.session_id().unwrap().to_string();

        agent.safe_run(&TaskRequest::Directive(Directive::MemoryStats), &ctx);
        assert_eq!(agent.session_id(), Some(session.as_str()));

        agent.safe_run(&TaskRequest::Directive(Directive::EndSession), &ctx);
        assert!(agent.session_id().is_none());

        let record = agent.memory().get_session(&session).unwrap().unwrap();
        assert!(record.end_time.is_some());
    }

    #[test]
    fn test_shelf_life_applies_to_router() {
        let dir = TempDir::new().unwrap();
        let memory = Arc::new(
            MemoryService::open(MemoryConfig::new(dir.path().join("memory.db"))).unwrap(),
        );
        let llm = Box::new(StubLlm {
            calls: Arc::new(AtomicUsize::new(0)),
            reply: "ok".to_string(),
            fail: false,
        });
        let config = DeskAgentConfig {
            max_runs: 1,
            ..DeskAgentConfig::default()
        };
        let mut agent = DeskAgent::new(config, llm, memory).unwrap();
        let ctx = TaskContext::default();

        agent.safe_run(&TaskRequest::Directive(Directive::MemoryStats), &ctx);
        assert_eq!(
            agent.safe_run(&TaskRequest::Directive(Directive::MemoryStats), &ctx),
            RunOutcome::Expired { runs: 1 }
        );
    }

    #[test]
    fn test_console_request_always_gets_a_message() {
        let (mut agent, _calls, _dir) = build_agent(false);
        let outcome = agent.safe_run(
            &TaskRequest::Directive(Directive::ShowConsole),
            &TaskContext::default(),
        );
        match outcome {
            RunOutcome::Completed { response } => {
                assert!(response.contains("console") || response.contains("Console"))
            }
            other => panic!("expected completion, got {other:?}"),
        }
    }

    #[test]
    fn test_self_diagnose_survives_llm_outage() {
        let (mut agent, _calls, _dir) = build_agent(true);
        let report = agent.self_diagnose(&DiagnoseParams::default()).unwrap();

        assert!(report.contains("System info"));
        assert!(report.contains("Memory service"));
        assert!(report.contains("Language model: ERROR"));
        assert!(report.contains("Remote memory server: no URL"));

        // The sweep itself is logged as an internal interaction.
        let logged = agent.memory().get_recent_interactions(10, None).unwrap();
        assert!(logged
            .iter()
            .any(|i| i.method == "self_diagnose" && i.channel == InteractionChannel::Internal));
    }

    #[test]
    fn test_graph_directives_render_cached_edges() {
        let (mut agent, _calls, _dir) = build_agent(false);
        let edges = vec![
            json!({"source": "ws1", "target": "project_mill", "type": "contains"}),
            json!({"source": "ws1", "target": "project_forge", "type": "contains"}),
        ];
        agent.memory().apply_edges(&edges).unwrap();
        let ctx = TaskContext::default();

        let overview = agent.safe_run(&TaskRequest::Directive(Directive::WorkspaceOverview), &ctx);
        match overview {
            RunOutcome::Completed { response } => {
                assert!(response.contains("ws1"));
                assert!(response.contains("project_mill"));
            }
            other => panic!("expected completion, got {other:?}"),
        }

        let query = agent.safe_run(
            &TaskRequest::Directive(Directive::QueryGraph {
                source: None,
                target: None,
                edge_type: Some("contains".to_string()),
            }),
            &ctx,
        );
        match query {
            RunOutcome::Completed { response } => {
                assert!(response.contains("Found 2 edges"));
                assert!(response.contains("ws1 --(contains)--> project_mill"));
            }
            other => panic!("expected completion, got {other:?}"),
        }

        let context = agent.safe_run(
            &TaskRequest::Directive(Directive::ProjectContext {
                project: "mill".to_string(),
            }),
            &ctx,
        );
        match context {
            RunOutcome::Completed { response } => {
                assert!(response.contains("Workspace: ws1"));
                assert!(response.contains("project_forge"));
            }
            other => panic!("expected completion, got {other:?}"),
        }
    }

    #[test]
    fn test_dispatch_action_runs_capability_module_and_logs() {
        let (mut agent, _calls, dir) = build_agent(false);
        let note = dir.path().join("note.txt");
        std::fs::write(&note, "hello").unwrap();

        let action = json!({"action": "list_directory", "path": dir.path().to_str().unwrap()});
        let outcome = agent
            .dispatch_action(&action, &TaskContext::default())
            .unwrap();
        assert!(outcome.success);
        assert!(outcome.message.contains("note.txt"));

        let logged = agent.memory().get_recent_interactions(10, None).unwrap();
        assert_eq!(logged.len(), 1);
        let actions = logged[0].actions_executed.as_ref().unwrap();
        assert_eq!(actions[0]["action"], "list_directory");
    }

    #[test]
    fn test_unknown_action_fails_in_band() {
        let (mut agent, _calls, _dir) = build_agent(false);
        let outcome = agent.execute_action(&json!({"action": "levitate"}));
        assert!(!outcome.success);
        assert!(outcome.message.contains("Unknown action"));

        let outcome = agent.execute_action(&json!({"path": "/tmp"}));
        assert!(!outcome.success);
    }

    #[test]
    fn test_empty_graph_reports_degrade_gracefully() {
        let (mut agent, _calls, _dir) = build_agent(false);
        let ctx = TaskContext::default();

        let query = agent.safe_run(
            &TaskRequest::Directive(Directive::QueryGraph {
                source: None,
                target: None,
                edge_type: None,
            }),
            &ctx,
        );
        match query {
            RunOutcome::Completed { response } => {
                assert!(response.contains("No matching edges"))
            }
            other => panic!("expected completion, got {other:?}"),
        }
    }
}
