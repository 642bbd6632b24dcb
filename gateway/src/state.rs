use std::sync::Arc;

use tracing::info;

use crate::config::ServerConfig;
use crate::core::agent::{AgentResult, EchoAgentBackend, HttpAgentBackend, SharedAgent};
use crate::core::speech::{NullSpeechModel, SharedSpeech};

/// Application state shared by every connection
pub struct AppState {
    pub config: ServerConfig,
    pub agent: SharedAgent,
    pub speech: SharedSpeech,
}

impl AppState {
    /// Build state from configuration.
    ///
    /// Uses the HTTP agent when `agent_url` is set and the echo agent
    /// otherwise. Speech goes to the null model.
    pub fn new(config: ServerConfig) -> AgentResult<Arc<Self>> {
        let agent: SharedAgent = match &config.agent_url {
            Some(url) => Arc::new(HttpAgentBackend::new(url.clone(), config.agent_timeout())?),
            None => {
                info!("AGENT_URL not set, using echo agent");
                Arc::new(EchoAgentBackend::new())
            }
        };
        Ok(Self::with_backends(config, agent, Arc::new(NullSpeechModel)))
    }

    /// Build state around explicit collaborators
    pub fn with_backends(config: ServerConfig, agent: SharedAgent, speech: SharedSpeech) -> Arc<Self> {
        info!(
            agent = agent.name(),
            speech = speech.name(),
            "Application state initialized"
        );
        Arc::new(Self {
            config,
            agent,
            speech,
        })
    }
}
