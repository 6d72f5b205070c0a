//! SQLite-backed memory and knowledge service.
//!
//! Durable, thread-safe log of every interaction the surrounding system
//! performs, a heuristic learning layer over that log, and a locally cached
//! mirror of a remote relationship graph. All storage access is serialized
//! through one mutex; no connection is held across a method boundary.

use chrono::{Duration, Local};
use famulus_types::{
    GraphEdge, Interaction, InteractionChannel, KnowledgeEntry, KnowledgeSource, MemoryStats,
    NewInteraction, ProjectContext, RemoteFetch, ResourceUse, SessionRecord, SyncReport,
    TrainingReport, TrainingStats, WorkspaceGroup,
};
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use serde_json::Value;
use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::Result;

/// Default timeout for a single remote-graph fetch.
const REMOTE_FETCH_TIMEOUT_SECS: u64 = 15;

/// Substantial-response threshold for the response-pattern heuristic.
const RESPONSE_PATTERN_MIN_LEN: usize = 50;

static EXECUTED_COMMAND_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)executed command:?\s*([^\n]+)").expect("valid regex"));

/// Configuration for opening a [`MemoryService`].
#[derive(Debug, Clone)]
pub struct MemoryConfig {
    pub db_path: PathBuf,
    /// Default source for remote-graph syncs.
    pub remote_memory_url: Option<String>,
    /// Attempt one best-effort graph sync at startup.
    pub sync_on_init: bool,
}

impl MemoryConfig {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            remote_memory_url: None,
            sync_on_init: false,
        }
    }
}

/// A successful exchange handed to the learning heuristics.
#[derive(Debug, Clone, Copy)]
pub struct LearnSample<'a> {
    pub user_input: &'a str,
    pub agent_response: &'a str,
    pub success: bool,
}

/// Thread-safe SQLite store for interactions, sessions, knowledge, and the
/// remote relationship graph.
pub struct MemoryService {
    db_path: PathBuf,
    conn: Mutex<Connection>,
    remote_memory_url: Option<String>,
}

impl MemoryService {
    /// Open (creating if absent) the backing store and initialize the
    /// schema idempotently. When configured, attempts one remote-graph
    /// sync; sync failures never fail initialization.
    pub fn open(config: MemoryConfig) -> Result<Self> {
        if let Some(parent) = config.db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(&config.db_path)?;
        let service = Self {
            db_path: config.db_path,
            conn: Mutex::new(conn),
            remote_memory_url: config.remote_memory_url,
        };
        service.init_schema()?;

        if config.sync_on_init && service.remote_memory_url.is_some() {
            match service.sync_remote_graph(None, false) {
                Ok(report) if report.success => {
                    info!(
                        target: "famulus::memory",
                        synced = report.synced_count,
                        "initial graph sync"
                    );
                }
                Ok(report) => {
                    let detail = report
                        .error
                        .or(report.message)
                        .unwrap_or_else(|| "unknown".to_string());
                    debug!(target: "famulus::memory", detail = %detail, "initial graph sync skipped");
                }
                Err(e) => {
                    debug!(target: "famulus::memory", error = %e, "initial graph sync failed");
                }
            }
        }

        Ok(service)
    }

    /// Absolute path of the backing database file.
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS interactions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                session_id TEXT,
                interaction_type TEXT NOT NULL,
                method TEXT NOT NULL,
                user_input TEXT,
                agent_response TEXT,
                actions_executed TEXT,
                success INTEGER NOT NULL DEFAULT 1,
                error_message TEXT,
                metadata TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_interactions_session_id
                ON interactions(session_id);
            CREATE INDEX IF NOT EXISTS idx_interactions_timestamp
                ON interactions(timestamp);

            CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                start_time TEXT NOT NULL,
                end_time TEXT,
                interaction_count INTEGER NOT NULL DEFAULT 0,
                user_agent TEXT,
                ip_address TEXT
            );

            CREATE TABLE IF NOT EXISTS knowledge (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                key TEXT NOT NULL UNIQUE,
                value TEXT NOT NULL,
                category TEXT,
                confidence REAL NOT NULL DEFAULT 1.0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                source TEXT
            );

            CREATE TABLE IF NOT EXISTS remote_graph (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                source TEXT NOT NULL,
                target TEXT NOT NULL,
                type TEXT NOT NULL,
                strength TEXT,
                order_index INTEGER,
                purpose TEXT,
                updated_at TEXT NOT NULL,
                UNIQUE(source, target, type)
            );
            "#,
        )?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Sessions
    // ------------------------------------------------------------------

    /// Start a new session and return its token.
    pub fn start_session(
        &self,
        user_agent: Option<&str>,
        ip_address: Option<&str>,
    ) -> Result<String> {
        let suffix: String = Uuid::new_v4().simple().to_string().chars().take(8).collect();
        let session_id = format!(
            "session_{}_{}",
            Local::now().format("%Y%m%d_%H%M%S"),
            suffix
        );

        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO sessions (id, start_time, user_agent, ip_address)
             VALUES (?1, ?2, ?3, ?4)",
            params![session_id, now_iso(), user_agent, ip_address],
        )?;

        debug!(target: "famulus::memory", session = %session_id, "session started");
        Ok(session_id)
    }

    /// Close a session: set `end_time` and recompute its interaction count.
    /// Idempotent; a second call recomputes the same values. Silently a
    /// no-op for unknown ids.
    pub fn end_session(&self, session_id: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE sessions
             SET end_time = ?1, interaction_count = (
                 SELECT COUNT(*) FROM interactions WHERE session_id = ?2
             )
             WHERE id = ?3",
            params![now_iso(), session_id, session_id],
        )?;
        Ok(())
    }

    /// Fetch a session record by token.
    pub fn get_session(&self, session_id: &str) -> Result<Option<SessionRecord>> {
        let conn = self.conn.lock().unwrap();
        let record = conn
            .query_row(
                "SELECT id, start_time, end_time, interaction_count, user_agent, ip_address
                 FROM sessions WHERE id = ?1",
                params![session_id],
                |row| {
                    Ok(SessionRecord {
                        id: row.get(0)?,
                        start_time: row.get(1)?,
                        end_time: row.get(2)?,
                        interaction_count: row.get(3)?,
                        user_agent: row.get(4)?,
                        ip_address: row.get(5)?,
                    })
                },
            )
            .optional()?;
        Ok(record)
    }

    // ------------------------------------------------------------------
    // Interactions
    // ------------------------------------------------------------------

    /// Append one interaction row. Unknown session ids are tolerated;
    /// storage failures propagate.
    pub fn log_interaction(&self, row: NewInteraction<'_>) -> Result<i64> {
        let actions = row
            .actions_executed
            .map(serde_json::to_string)
            .transpose()?;
        let metadata = row.metadata.map(serde_json::to_string).transpose()?;

        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO interactions
             (timestamp, session_id, interaction_type, method, user_input,
              agent_response, actions_executed, success, error_message, metadata)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                now_iso(),
                row.session_id,
                row.channel.as_str(),
                row.method,
                row.user_input,
                row.agent_response,
                actions,
                row.success as i64,
                row.error_message,
                metadata,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Most recent interactions, optionally scoped to one session.
    pub fn get_recent_interactions(
        &self,
        limit: u32,
        session_id: Option<&str>,
    ) -> Result<Vec<Interaction>> {
        let conn = self.conn.lock().unwrap();
        let rows = match session_id {
            Some(session) => {
                let mut stmt = conn.prepare(
                    "SELECT id, timestamp, session_id, interaction_type, method, user_input,
                            agent_response, actions_executed, success, error_message, metadata
                     FROM interactions
                     WHERE session_id = ?1
                     ORDER BY timestamp DESC
                     LIMIT ?2",
                )?;
                stmt.query_map(params![session, limit], row_to_interaction)?
                    .collect::<std::result::Result<Vec<_>, _>>()?
            }
            None => {
                let mut stmt = conn.prepare(
                    "SELECT id, timestamp, session_id, interaction_type, method, user_input,
                            agent_response, actions_executed, success, error_message, metadata
                     FROM interactions
                     ORDER BY timestamp DESC
                     LIMIT ?1",
                )?;
                stmt.query_map(params![limit], row_to_interaction)?
                    .collect::<std::result::Result<Vec<_>, _>>()?
            }
        };
        Ok(rows)
    }

    /// Substring search over inputs and responses, newest first.
    pub fn search_interactions(&self, query: &str, limit: u32) -> Result<Vec<Interaction>> {
        let pattern = format!("%{query}%");
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, timestamp, session_id, interaction_type, method, user_input,
                    agent_response, actions_executed, success, error_message, metadata
             FROM interactions
             WHERE user_input LIKE ?1 OR agent_response LIKE ?1
             ORDER BY timestamp DESC
             LIMIT ?2",
        )?;
        let rows = stmt
            .query_map(params![pattern, limit], row_to_interaction)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // ------------------------------------------------------------------
    // Knowledge
    // ------------------------------------------------------------------

    /// Upsert a knowledge entry by key. Insert-or-replace: the most recent
    /// store wins on every column, including `created_at`.
    pub fn store_knowledge(
        &self,
        key: &str,
        value: &str,
        category: Option<&str>,
        confidence: f64,
        source: KnowledgeSource,
    ) -> Result<()> {
        let now = now_iso();
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO knowledge
             (key, value, category, confidence, created_at, updated_at, source)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![key, value, category, confidence, now, now, source.as_str()],
        )?;
        Ok(())
    }

    /// Point lookup of a stored value.
    pub fn retrieve_knowledge(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock().unwrap();
        let value = conn
            .query_row(
                "SELECT value FROM knowledge WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    /// Full knowledge entry, for programmatic consumers.
    pub fn get_knowledge_entry(&self, key: &str) -> Result<Option<KnowledgeEntry>> {
        let conn = self.conn.lock().unwrap();
        let entry = conn
            .query_row(
                "SELECT key, value, category, confidence, created_at, updated_at, source
                 FROM knowledge WHERE key = ?1",
                params![key],
                |row| {
                    let source: String = row.get(6)?;
                    Ok(KnowledgeEntry {
                        key: row.get(0)?,
                        value: row.get(1)?,
                        category: row.get(2)?,
                        confidence: row.get(3)?,
                        created_at: row.get(4)?,
                        updated_at: row.get(5)?,
                        source: source.parse().unwrap_or(KnowledgeSource::Manual),
                    })
                },
            )
            .optional()?;
        Ok(entry)
    }

    /// Learned user preferences (`user_preferences` category).
    pub fn get_user_preferences(&self) -> Result<BTreeMap<String, String>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt =
            conn.prepare("SELECT key, value FROM knowledge WHERE category = 'user_preferences'")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows.into_iter().collect())
    }

    /// Command patterns stored under the bucket of this input.
    pub fn get_command_patterns(&self, input_text: &str) -> Result<Vec<String>> {
        let key = format!("command_pattern_{}", input_bucket(&input_text.to_lowercase()));
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT value FROM knowledge WHERE key = ?1 AND category = 'command_patterns'",
        )?;
        let rows = stmt
            .query_map(params![key], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // ------------------------------------------------------------------
    // Stats
    // ------------------------------------------------------------------

    /// Point-in-time counters over the store.
    pub fn get_stats(&self) -> Result<MemoryStats> {
        let midnight = format!("{}T00:00:00", Local::now().format("%Y-%m-%d"));
        let conn = self.conn.lock().unwrap();

        let total_interactions: i64 =
            conn.query_row("SELECT COUNT(*) FROM interactions", [], |row| row.get(0))?;
        let active_sessions: i64 = conn.query_row(
            "SELECT COUNT(*) FROM sessions WHERE end_time IS NULL",
            [],
            |row| row.get(0),
        )?;
        let knowledge_entries: i64 =
            conn.query_row("SELECT COUNT(*) FROM knowledge", [], |row| row.get(0))?;
        let recent_interactions: i64 = conn.query_row(
            "SELECT COUNT(*) FROM interactions WHERE timestamp > ?1",
            params![midnight],
            |row| row.get(0),
        )?;

        Ok(MemoryStats {
            total_interactions,
            active_sessions,
            knowledge_entries,
            recent_interactions,
        })
    }

    /// Stats plus success rate, preference count, and the category
    /// breakdown of the knowledge table.
    pub fn get_training_stats(&self) -> Result<TrainingStats> {
        let stats = self.get_stats()?;
        let preferences = self.get_user_preferences()?;

        let conn = self.conn.lock().unwrap();
        let successful: i64 = conn.query_row(
            "SELECT COUNT(*) FROM interactions WHERE success = 1",
            [],
            |row| row.get(0),
        )?;
        let total: i64 =
            conn.query_row("SELECT COUNT(*) FROM interactions", [], |row| row.get(0))?;

        let mut stmt = conn.prepare(
            "SELECT COALESCE(category, 'uncategorized'), COUNT(*)
             FROM knowledge GROUP BY category",
        )?;
        let categories = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
            .collect::<std::result::Result<BTreeMap<_, _>, _>>()?;

        Ok(TrainingStats {
            stats,
            success_rate: if total > 0 {
                successful as f64 / total as f64
            } else {
                0.0
            },
            user_preferences: preferences.len(),
            pattern_categories: categories,
            learning_active: true,
        })
    }

    // ------------------------------------------------------------------
    // Learning
    // ------------------------------------------------------------------

    /// Learn patterns and preferences from one exchange. Failures are
    /// never learned from.
    pub fn learn_from_interaction(&self, sample: LearnSample<'_>) -> Result<()> {
        if !sample.success {
            return Ok(());
        }

        let input = sample.user_input.to_lowercase();
        let response = sample.agent_response.to_lowercase();

        if response.contains("run_command") || response.contains("executed") {
            self.learn_command_pattern(&input, &response)?;
        }

        if input.contains("file") && response.contains("created") {
            self.learn_file_preference(&input)?;
        } else if input.contains("directory") && response.contains("listed") {
            self.learn_directory_preference(&input)?;
        }

        if response.chars().count() > RESPONSE_PATTERN_MIN_LEN {
            self.learn_response_pattern(&input, &response)?;
        }

        Ok(())
    }

    fn learn_command_pattern(&self, input: &str, response: &str) -> Result<()> {
        if let Some(captures) = EXECUTED_COMMAND_RE.captures(response) {
            let command = captures[1].trim().to_string();
            let key = format!("command_pattern_{}", input_bucket(input));
            self.store_knowledge(
                &key,
                &command,
                Some("command_patterns"),
                0.8,
                KnowledgeSource::Learned,
            )?;
        }
        Ok(())
    }

    fn learn_file_preference(&self, input: &str) -> Result<()> {
        if input.contains("create") || input.contains("new") {
            self.store_knowledge(
                "prefers_file_creation",
                "true",
                Some("user_preferences"),
                0.9,
                KnowledgeSource::Learned,
            )?;
        } else if input.contains("edit") || input.contains("modify") {
            self.store_knowledge(
                "prefers_file_editing",
                "true",
                Some("user_preferences"),
                0.9,
                KnowledgeSource::Learned,
            )?;
        }
        Ok(())
    }

    fn learn_directory_preference(&self, input: &str) -> Result<()> {
        if input.contains("list") || input.contains("show") {
            self.store_knowledge(
                "prefers_directory_listing",
                "true",
                Some("user_preferences"),
                0.9,
                KnowledgeSource::Learned,
            )?;
        }
        Ok(())
    }

    fn learn_response_pattern(&self, input: &str, response: &str) -> Result<()> {
        // Deliberately lossy grouping key: the first three sorted,
        // deduplicated whitespace tokens of the input.
        let tokens: BTreeSet<&str> = input.split_whitespace().collect();
        let key_tokens: Vec<&str> = tokens.into_iter().take(3).collect();
        let key = format!("response_pattern_{}", key_tokens.join("_"));
        let value: String = response.chars().take(200).collect();
        self.store_knowledge(
            &key,
            &value,
            Some("response_patterns"),
            0.7,
            KnowledgeSource::Learned,
        )?;
        Ok(())
    }

    /// Past successful interactions whose input or response contains the
    /// current input; naive precedent retrieval.
    pub fn get_learning_context(
        &self,
        current_input: &str,
        limit: u32,
    ) -> Result<Vec<Interaction>> {
        let pattern = format!("%{}%", current_input.to_lowercase());
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, timestamp, session_id, interaction_type, method, user_input,
                    agent_response, actions_executed, success, error_message, metadata
             FROM interactions
             WHERE success = 1 AND (
                 LOWER(user_input) LIKE ?1 OR LOWER(agent_response) LIKE ?1
             )
             ORDER BY timestamp DESC
             LIMIT ?2",
        )?;
        let rows = stmt
            .query_map(params![pattern, limit], row_to_interaction)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Replay successful history newer than the cutoff through the
    /// learning heuristics. `patterns_learned` counts interactions that
    /// carried a non-empty `actions_executed` payload.
    pub fn train_from_history(&self, days_back: i64) -> Result<TrainingReport> {
        let cutoff = (Local::now() - Duration::days(days_back))
            .naive_local()
            .format("%Y-%m-%dT%H:%M:%S%.6f")
            .to_string();

        // Collect first so the learning pass re-acquires the lock per
        // store; the lock is never held across a method boundary.
        let interactions = {
            let conn = self.conn.lock().unwrap();
            let mut stmt = conn.prepare(
                "SELECT id, timestamp, session_id, interaction_type, method, user_input,
                        agent_response, actions_executed, success, error_message, metadata
                 FROM interactions
                 WHERE timestamp > ?1 AND success = 1",
            )?;
            let rows = stmt
                .query_map(params![cutoff], row_to_interaction)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows
        };

        let mut patterns_learned = 0;
        for interaction in &interactions {
            self.learn_from_interaction(LearnSample {
                user_input: interaction.user_input.as_deref().unwrap_or(""),
                agent_response: interaction.agent_response.as_deref().unwrap_or(""),
                success: interaction.success,
            })?;
            if interaction
                .actions_executed
                .as_ref()
                .is_some_and(|actions| !actions.is_empty())
            {
                patterns_learned += 1;
            }
        }

        info!(
            target: "famulus::memory",
            processed = interactions.len(),
            patterns = patterns_learned,
            days = days_back,
            "training pass complete"
        );

        Ok(TrainingReport {
            interactions_processed: interactions.len(),
            patterns_learned,
            training_period_days: days_back,
        })
    }

    // ------------------------------------------------------------------
    // Remote graph
    // ------------------------------------------------------------------

    /// Single synchronous GET against a remote memory server, expecting
    /// JSON. Network and parse failures are captured, never raised.
    pub fn connect_to_remote_memory_server(&self, url: &str, timeout_secs: u64) -> RemoteFetch {
        let agent = ureq::AgentBuilder::new()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build();

        match agent.get(url).call() {
            Ok(response) => match response.into_json::<Value>() {
                Ok(data) => RemoteFetch::ok(data),
                Err(e) => RemoteFetch::err(format!("Invalid JSON from remote memory server: {e}")),
            },
            Err(ureq::Error::Status(code, response)) => RemoteFetch::err(format!(
                "Server responded with status {code}: {}",
                response.into_string().unwrap_or_default()
            )),
            Err(e) => RemoteFetch::err(format!("Error connecting to remote memory server: {e}")),
        }
    }

    /// Sync the remote graph into the local cache.
    ///
    /// Unless forced, the fetch is skipped entirely when any cached edge
    /// was updated within the last hour; the whole table shares one
    /// freshness signal. Malformed edges are skipped silently; valid ones
    /// are upserted by `(source, target, type)`.
    pub fn sync_remote_graph(&self, url: Option<&str>, force: bool) -> Result<SyncReport> {
        let Some(remote_url) = url.or(self.remote_memory_url.as_deref()) else {
            return Ok(SyncReport::failed("No remote memory URL configured"));
        };

        if !force && self.recently_synced()? {
            return Ok(SyncReport::skipped("Recently synced, skipping"));
        }

        let fetch = self.connect_to_remote_memory_server(remote_url, REMOTE_FETCH_TIMEOUT_SECS);
        if !fetch.success {
            return Ok(SyncReport::failed(
                fetch.error.unwrap_or_else(|| "Remote fetch failed".to_string()),
            ));
        }

        let Some(Value::Array(edges)) = fetch.data else {
            return Ok(SyncReport::failed("Remote data is not a list of edges"));
        };

        let synced = self.apply_edges(&edges)?;
        info!(target: "famulus::memory", synced, url = remote_url, "remote graph synced");
        Ok(SyncReport::synced(synced))
    }

    /// True when any cached edge was refreshed within the freshness window.
    fn recently_synced(&self) -> Result<bool> {
        let cutoff = (Local::now() - Duration::hours(1))
            .naive_local()
            .format("%Y-%m-%dT%H:%M:%S%.6f")
            .to_string();
        let conn = self.conn.lock().unwrap();
        let recent: i64 = conn.query_row(
            "SELECT COUNT(*) FROM remote_graph WHERE updated_at > ?1",
            params![cutoff],
            |row| row.get(0),
        )?;
        Ok(recent > 0)
    }

    /// Upsert edge-shaped values, skipping any without source/target/type.
    /// Returns the number of edges written.
    pub(crate) fn apply_edges(&self, edges: &[Value]) -> Result<usize> {
        let now = now_iso();
        let mut synced = 0;

        let conn = self.conn.lock().unwrap();
        for edge in edges {
            let Some(obj) = edge.as_object() else {
                continue;
            };
            let source = obj.get("source").and_then(Value::as_str).unwrap_or("");
            let target = obj.get("target").and_then(Value::as_str).unwrap_or("");
            let edge_type = obj.get("type").and_then(Value::as_str).unwrap_or("");
            if source.is_empty() || target.is_empty() || edge_type.is_empty() {
                warn!(target: "famulus::memory", "skipping malformed graph edge");
                continue;
            }

            let strength = obj.get("strength").map(value_as_text);
            let order_index = obj.get("order").and_then(Value::as_i64);
            let purpose = obj.get("purpose").and_then(Value::as_str);

            conn.execute(
                "INSERT OR REPLACE INTO remote_graph
                 (source, target, type, strength, order_index, purpose, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![source, target, edge_type, strength, order_index, purpose, now],
            )?;
            synced += 1;
        }

        Ok(synced)
    }

    /// Filtered read over the cached edges; provided filters AND-combine.
    pub fn get_remote_graph_edges(
        &self,
        source: Option<&str>,
        target: Option<&str>,
        edge_type: Option<&str>,
    ) -> Result<Vec<GraphEdge>> {
        let mut sql = String::from(
            "SELECT source, target, type, strength, order_index, purpose, updated_at
             FROM remote_graph WHERE 1=1",
        );
        let mut filters: Vec<String> = Vec::new();

        if let Some(source) = source {
            sql.push_str(&format!(" AND source = ?{}", filters.len() + 1));
            filters.push(source.to_string());
        }
        if let Some(target) = target {
            sql.push_str(&format!(" AND target = ?{}", filters.len() + 1));
            filters.push(target.to_string());
        }
        if let Some(edge_type) = edge_type {
            sql.push_str(&format!(" AND type = ?{}", filters.len() + 1));
            filters.push(edge_type.to_string());
        }

        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(filters.iter()), |row| {
                Ok(GraphEdge {
                    source: row.get(0)?,
                    target: row.get(1)?,
                    edge_type: row.get(2)?,
                    strength: row.get(3)?,
                    order_index: row.get(4)?,
                    purpose: row.get(5)?,
                    updated_at: row.get(6)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Other projects contained by the workspace(s) that contain this one.
    pub fn find_related_projects(&self, project_name: &str) -> Result<Vec<String>> {
        let edges = self.get_remote_graph_edges(None, None, None)?;
        let mut related = BTreeSet::new();

        for edge in &edges {
            if edge.edge_type == "contains" && edge.target == project_name {
                let workspace = &edge.source;
                for other in &edges {
                    if other.edge_type == "contains"
                        && &other.source == workspace
                        && other.target != project_name
                    {
                        related.insert(other.target.clone());
                    }
                }
            }
        }

        Ok(related.into_iter().collect())
    }

    /// Aggregate context for a project from the cached edge snapshot.
    ///
    /// A possibly-partial name is resolved to a canonical node: exact
    /// substring match against `project_`-namespaced nodes first, then a
    /// case-insensitive prefix match, else the name as given.
    pub fn get_project_context(&self, project_name: &str) -> Result<ProjectContext> {
        let edges = self.get_remote_graph_edges(None, None, None)?;
        let canonical = resolve_project_node(&edges, project_name);

        let mut context = ProjectContext {
            project: project_name.to_string(),
            workspace: None,
            related_projects: Vec::new(),
            configurations: Vec::new(),
            resources: Vec::new(),
            purpose: None,
        };

        for edge in &edges {
            if edge.target == canonical && edge.edge_type == "contains" {
                context.workspace = Some(edge.source.clone());
            } else if edge.source == canonical {
                match edge.edge_type.as_str() {
                    "uses" => context.resources.push(ResourceUse {
                        resource: edge.target.clone(),
                        purpose: edge.purpose.clone(),
                    }),
                    "enables" => context.purpose = Some(format!("Enables {}", edge.target)),
                    "configures" => context.configurations.push(edge.target.clone()),
                    _ => {}
                }
            }
        }

        context.related_projects = self.find_related_projects(&canonical)?;
        Ok(context)
    }

    /// Group `contains` and `configures` edges by their workspace node.
    pub fn get_workspace_overview(&self) -> Result<BTreeMap<String, WorkspaceGroup>> {
        let edges = self.get_remote_graph_edges(None, None, None)?;
        let mut workspaces: BTreeMap<String, WorkspaceGroup> = BTreeMap::new();

        for edge in edges {
            match edge.edge_type.as_str() {
                "contains" => workspaces
                    .entry(edge.source)
                    .or_default()
                    .projects
                    .push(edge.target),
                "configures" => workspaces
                    .entry(edge.source)
                    .or_default()
                    .configurations
                    .push(edge.target),
                _ => {}
            }
        }

        Ok(workspaces)
    }
}

/// Local naive ISO-8601 timestamp, matching the on-disk format.
fn now_iso() -> String {
    Local::now()
        .naive_local()
        .format("%Y-%m-%dT%H:%M:%S%.6f")
        .to_string()
}

/// Lossy bucketing of an input into one of 1000 groups. Collisions group
/// "similar" inputs on purpose.
fn input_bucket(input: &str) -> u64 {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    input.hash(&mut hasher);
    hasher.finish() % 1000
}

fn value_as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Resolve a possibly-partial project name to a canonical graph node.
fn resolve_project_node(edges: &[GraphEdge], project_name: &str) -> String {
    // Exact pass: a project_-namespaced node containing the given name.
    for edge in edges {
        for node in [&edge.source, &edge.target] {
            if node.contains("project_") && node.contains(project_name) {
                return node.clone();
            }
        }
    }

    // Partial pass: case-insensitive match against project_-prefixed nodes.
    let lowered = project_name.to_lowercase();
    for edge in edges {
        for node in [&edge.source, &edge.target] {
            if node.starts_with("project_") && node.to_lowercase().contains(&lowered) {
                return node.clone();
            }
        }
    }

    project_name.to_string()
}

fn row_to_interaction(row: &rusqlite::Row<'_>) -> rusqlite::Result<Interaction> {
    let channel: String = row.get(3)?;
    let actions: Option<String> = row.get(7)?;
    let metadata: Option<String> = row.get(10)?;
    let success: i64 = row.get(8)?;

    Ok(Interaction {
        id: row.get(0)?,
        timestamp: row.get(1)?,
        session_id: row.get(2)?,
        channel: channel.parse().unwrap_or(InteractionChannel::Internal),
        method: row.get(4)?,
        user_input: row.get(5)?,
        agent_response: row.get(6)?,
        actions_executed: actions.and_then(|s| serde_json::from_str(&s).ok()),
        success: success != 0,
        error_message: row.get(9)?,
        metadata: metadata.and_then(|s| serde_json::from_str(&s).ok()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn open_service() -> (MemoryService, TempDir) {
        let dir = TempDir::new().unwrap();
        let service =
            MemoryService::open(MemoryConfig::new(dir.path().join("memory.db"))).unwrap();
        (service, dir)
    }

    fn log_simple(service: &MemoryService, session: &str, input: &str, response: &str) {
        service
            .log_interaction(
                NewInteraction::new(InteractionChannel::Api, "chat")
                    .input(input)
                    .response(response)
                    .session(session),
            )
            .unwrap();
    }

    #[test]
    fn test_empty_store_stats_are_zero() {
        let (service, _dir) = open_service();
        let stats = service.get_stats().unwrap();
        assert_eq!(stats, MemoryStats::default());
    }

    #[test]
    fn test_schema_init_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("memory.db");
        drop(MemoryService::open(MemoryConfig::new(&path)).unwrap());
        // Reopening the same file must not fail or lose data.
        let service = MemoryService::open(MemoryConfig::new(&path)).unwrap();
        assert_eq!(service.get_stats().unwrap().total_interactions, 0);
    }

    #[test]
    fn test_session_accounting() {
        let (service, _dir) = open_service();
        let session = service.start_session(Some("test"), None).unwrap();

        for i in 0..3 {
            log_simple(&service, &session, &format!("input {i}"), "ok");
        }
        service.end_session(&session).unwrap();

        let record = service.get_session(&session).unwrap().unwrap();
        assert_eq!(record.interaction_count, 3);
        assert!(record.end_time.is_some());

        // Idempotent: a second close recomputes the same count.
        service.end_session(&session).unwrap();
        let record = service.get_session(&session).unwrap().unwrap();
        assert_eq!(record.interaction_count, 3);
    }

    #[test]
    fn test_end_unknown_session_is_a_noop() {
        let (service, _dir) = open_service();
        service.end_session("session_never_started").unwrap();
    }

    #[test]
    fn test_interaction_round_trip_with_actions() {
        let (service, _dir) = open_service();
        let actions = vec![json!({"action": "run_command", "command": "ls"})];
        service
            .log_interaction(
                NewInteraction::new(InteractionChannel::Cli, "action")
                    .input("list files")
                    .response("Executed command: ls")
                    .actions(&actions),
            )
            .unwrap();

        let rows = service.get_recent_interactions(10, None).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].channel, InteractionChannel::Cli);
        assert_eq!(rows[0].actions_executed.as_ref().unwrap().len(), 1);
        assert!(rows[0].success);
    }

    #[test]
    fn test_search_matches_input_and_response() {
        let (service, _dir) = open_service();
        log_simple(&service, "s1", "weather in berlin", "sunny");
        log_simple(&service, "s1", "news", "berlin marathon results");
        log_simple(&service, "s1", "unrelated", "nothing here");

        let hits = service.search_interactions("berlin", 50).unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn test_knowledge_last_write_wins() {
        let (service, _dir) = open_service();
        service
            .store_knowledge("k1", "v1", Some("cat"), 0.5, KnowledgeSource::Manual)
            .unwrap();
        assert_eq!(service.retrieve_knowledge("k1").unwrap().unwrap(), "v1");

        let first = service.get_knowledge_entry("k1").unwrap().unwrap();
        std::thread::sleep(std::time::Duration::from_millis(10));

        service
            .store_knowledge("k1", "v2", Some("cat"), 0.6, KnowledgeSource::Manual)
            .unwrap();
        assert_eq!(service.retrieve_knowledge("k1").unwrap().unwrap(), "v2");

        // Insert-or-replace semantics: created_at is overwritten too.
        let second = service.get_knowledge_entry("k1").unwrap().unwrap();
        assert!(second.created_at > first.created_at);
        assert_eq!(service.get_stats().unwrap().knowledge_entries, 1);
    }

    #[test]
    fn test_learning_is_gated_on_success() {
        let (service, _dir) = open_service();
        service
            .learn_from_interaction(LearnSample {
                user_input: "create a new file please",
                agent_response: "Executed command: touch notes.txt - file created",
                success: false,
            })
            .unwrap();
        assert_eq!(service.get_stats().unwrap().knowledge_entries, 0);
    }

    #[test]
    fn test_command_pattern_extraction_and_lookup() {
        let (service, _dir) = open_service();
        service
            .learn_from_interaction(LearnSample {
                user_input: "Show Disk Usage",
                agent_response: "Executed command: df -h",
                success: true,
            })
            .unwrap();

        let patterns = service.get_command_patterns("show disk usage").unwrap();
        assert_eq!(patterns, vec!["df -h".to_string()]);
    }

    #[test]
    fn test_file_and_directory_preferences() {
        let (service, _dir) = open_service();
        service
            .learn_from_interaction(LearnSample {
                user_input: "create a file for meeting notes",
                agent_response: "file created",
                success: true,
            })
            .unwrap();
        service
            .learn_from_interaction(LearnSample {
                user_input: "list the directory",
                agent_response: "directory listed",
                success: true,
            })
            .unwrap();

        let prefs = service.get_user_preferences().unwrap();
        assert_eq!(prefs.get("prefers_file_creation").map(String::as_str), Some("true"));
        assert_eq!(
            prefs.get("prefers_directory_listing").map(String::as_str),
            Some("true")
        );
    }

    #[test]
    fn test_response_pattern_key_is_sorted_and_bounded() {
        let (service, _dir) = open_service();
        let long_response = "x".repeat(300);
        service
            .learn_from_interaction(LearnSample {
                user_input: "zeta alpha beta alpha",
                agent_response: &long_response,
                success: true,
            })
            .unwrap();

        let value = service
            .retrieve_knowledge("response_pattern_alpha_beta_zeta")
            .unwrap()
            .unwrap();
        assert_eq!(value.chars().count(), 200);
    }

    #[test]
    fn test_learning_context_only_returns_successes() {
        let (service, _dir) = open_service();
        log_simple(&service, "s1", "deploy the site", "deployed");
        service
            .log_interaction(
                NewInteraction::new(InteractionChannel::Api, "chat")
                    .input("deploy the site")
                    .failed("build broke"),
            )
            .unwrap();

        let context = service.get_learning_context("deploy", 5).unwrap();
        assert_eq!(context.len(), 1);
        assert!(context[0].success);
    }

    #[test]
    fn test_train_from_history_counts() {
        let (service, _dir) = open_service();
        let actions = vec![json!({"action": "run_command"})];
        service
            .log_interaction(
                NewInteraction::new(InteractionChannel::Api, "action")
                    .input("show disk usage")
                    .response("Executed command: df -h")
                    .actions(&actions),
            )
            .unwrap();
        log_simple(&service, "s1", "hello", "hi");
        service
            .log_interaction(
                NewInteraction::new(InteractionChannel::Api, "chat")
                    .input("broken")
                    .failed("nope"),
            )
            .unwrap();

        let report = service.train_from_history(30).unwrap();
        assert_eq!(report.interactions_processed, 2);
        assert_eq!(report.patterns_learned, 1);
        assert_eq!(report.training_period_days, 30);
        assert!(service.get_stats().unwrap().knowledge_entries > 0);
    }

    #[test]
    fn test_training_stats_success_rate() {
        let (service, _dir) = open_service();
        log_simple(&service, "s1", "a", "b");
        service
            .log_interaction(
                NewInteraction::new(InteractionChannel::Api, "chat")
                    .input("c")
                    .failed("boom"),
            )
            .unwrap();

        let stats = service.get_training_stats().unwrap();
        assert!((stats.success_rate - 0.5).abs() < f64::EPSILON);
        assert!(stats.learning_active);
    }

    #[test]
    fn test_graph_upsert_is_idempotent_and_refreshes_timestamp() {
        let (service, _dir) = open_service();
        let edges = vec![
            json!({"source": "ws1", "target": "project_a", "type": "contains"}),
            json!({"source": "project_a", "target": "postgres", "type": "uses", "purpose": "storage"}),
            json!({"source": "ws1", "type": "contains"}), // malformed, skipped
        ];

        assert_eq!(service.apply_edges(&edges).unwrap(), 2);
        let first = service.get_remote_graph_edges(None, None, None).unwrap();
        assert_eq!(first.len(), 2);

        std::thread::sleep(std::time::Duration::from_millis(10));
        assert_eq!(service.apply_edges(&edges).unwrap(), 2);

        let second = service.get_remote_graph_edges(None, None, None).unwrap();
        assert_eq!(second.len(), 2, "re-sync must not duplicate rows");
        assert!(second[0].updated_at > first[0].updated_at);
    }

    #[test]
    fn test_freshness_window_skips_refetch() {
        let (service, _dir) = open_service();
        let edges = vec![json!({"source": "ws1", "target": "project_a", "type": "contains"})];
        service.apply_edges(&edges).unwrap();
        assert!(service.recently_synced().unwrap());

        // Within the window an unforced sync skips the fetch entirely:
        // the unreachable URL is never contacted.
        let report = service
            .sync_remote_graph(Some("http://127.0.0.1:1/graph"), false)
            .unwrap();
        assert!(report.success);
        assert_eq!(report.synced_count, 0);
        assert_eq!(report.message.as_deref(), Some("Recently synced, skipping"));
    }

    #[test]
    fn test_sync_without_url_fails_cleanly() {
        let (service, _dir) = open_service();
        let report = service.sync_remote_graph(None, false).unwrap();
        assert!(!report.success);
        assert_eq!(report.synced_count, 0);
    }

    #[test]
    fn test_edge_filters_and_combine() {
        let (service, _dir) = open_service();
        let edges = vec![
            json!({"source": "ws1", "target": "project_a", "type": "contains"}),
            json!({"source": "ws1", "target": "cfg", "type": "configures"}),
            json!({"source": "ws2", "target": "project_b", "type": "contains"}),
        ];
        service.apply_edges(&edges).unwrap();

        let contains = service
            .get_remote_graph_edges(Some("ws1"), None, Some("contains"))
            .unwrap();
        assert_eq!(contains.len(), 1);
        assert_eq!(contains[0].target, "project_a");
    }

    #[test]
    fn test_find_related_projects() {
        let (service, _dir) = open_service();
        let edges = vec![
            json!({"source": "ws1", "target": "proj1", "type": "contains"}),
            json!({"source": "ws1", "target": "proj2", "type": "contains"}),
        ];
        service.apply_edges(&edges).unwrap();

        assert_eq!(
            service.find_related_projects("proj1").unwrap(),
            vec!["proj2".to_string()]
        );
        assert!(service.find_related_projects("proj3").unwrap().is_empty());
    }

    #[test]
    fn test_project_context_resolution_and_aggregation() {
        let (service, _dir) = open_service();
        let edges = vec![
            json!({"source": "ws1", "target": "project_mill", "type": "contains"}),
            json!({"source": "ws1", "target": "project_forge", "type": "contains"}),
            json!({"source": "project_mill", "target": "postgres", "type": "uses", "purpose": "storage"}),
            json!({"source": "project_mill", "target": "invoicing", "type": "enables"}),
        ];
        service.apply_edges(&edges).unwrap();

        // Partial name resolves to the namespaced node.
        let context = service.get_project_context("mill").unwrap();
        assert_eq!(context.workspace.as_deref(), Some("ws1"));
        assert_eq!(context.related_projects, vec!["project_forge".to_string()]);
        assert_eq!(context.resources.len(), 1);
        assert_eq!(context.resources[0].resource, "postgres");
        assert_eq!(context.resources[0].purpose.as_deref(), Some("storage"));
        assert_eq!(context.purpose.as_deref(), Some("Enables invoicing"));
    }

    #[test]
    fn test_workspace_overview_groups_by_source() {
        let (service, _dir) = open_service();
        let edges = vec![
            json!({"source": "ws1", "target": "project_a", "type": "contains"}),
            json!({"source": "ws1", "target": "lint_rules", "type": "configures"}),
            json!({"source": "ws2", "target": "project_b", "type": "contains"}),
        ];
        service.apply_edges(&edges).unwrap();

        let overview = service.get_workspace_overview().unwrap();
        assert_eq!(overview.len(), 2);
        assert_eq!(overview["ws1"].projects, vec!["project_a".to_string()]);
        assert_eq!(overview["ws1"].configurations, vec!["lint_rules".to_string()]);
        assert!(overview["ws2"].configurations.is_empty());
    }

    #[test]
    fn test_concurrent_logging_is_serialized() {
        use std::sync::Arc;

        let dir = TempDir::new().unwrap();
        let service = Arc::new(
            MemoryService::open(MemoryConfig::new(dir.path().join("memory.db"))).unwrap(),
        );

        let handles: Vec<_> = (0..8)
            .map(|worker| {
                let service = Arc::clone(&service);
                std::thread::spawn(move || {
                    for i in 0..10 {
                        service
                            .log_interaction(
                                NewInteraction::new(InteractionChannel::Internal, "chat")
                                    .input(&format!("worker {worker} message {i}")),
                            )
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(service.get_stats().unwrap().total_interactions, 80);
    }
}
