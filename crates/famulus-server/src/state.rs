//! Shared application state.

use crate::config::Config;
use famulus_core::{
    DeskAgent, DeskAgentConfig, HttpLlmClient, LanguageModel, MemoryConfig, MemoryService,
};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Shared application state. The desk agent is behind an async mutex: the
/// bridge serializes agent dispatches, while read-only memory queries go
/// straight to the service.
pub struct AppState {
    pub agent: Mutex<DeskAgent>,
    pub memory: Arc<MemoryService>,
    pub config: Config,
}

impl AppState {
    pub fn new(config: Config) -> famulus_core::Result<Self> {
        let memory = Arc::new(MemoryService::open(MemoryConfig {
            db_path: config.db_path.clone(),
            remote_memory_url: config.remote_memory_url.clone(),
            sync_on_init: config.sync_on_init,
        })?);

        let llm: Box<dyn LanguageModel> =
            Box::new(HttpLlmClient::new(&config.llm_endpoint, &config.llm_model));
        let agent = DeskAgent::new(
            DeskAgentConfig {
                max_runs: config.max_runs,
                remote_memory_url: config.remote_memory_url.clone(),
                proxy_host: config.proxy_host.clone(),
                proxy_port: config.proxy_port,
            },
            llm,
            Arc::clone(&memory),
        )?;

        Ok(Self {
            agent: Mutex::new(agent),
            memory,
            config,
        })
    }
}
