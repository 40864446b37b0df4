use std::sync::Arc;
use std::time::Instant;

use crate::analysis::enhancer::{Enhancer, EnhancerOptions};
use crate::config::Config;
use crate::llm_client::CompletionClient;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// `None` when no LLM is configured; analysis then stays local.
    pub enhancer: Option<Arc<Enhancer>>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(config: Config, client: Option<Arc<dyn CompletionClient>>) -> Self {
        let enhancer = client.map(|client| {
            Arc::new(Enhancer::new(client, EnhancerOptions::from_config(&config)))
        });
        Self {
            config,
            enhancer,
            started_at: Instant::now(),
        }
    }
}
