//! CLI runner - executes commands

use crate::catalog::Catalog;
use crate::cli::commands::{Cli, Commands};
use crate::config::TapConfig;
use crate::error::{Error, Result};
use crate::http::HttpClient;
use crate::pipeline::{ExtractionPipeline, JsonLinesSink};
use crate::state::StateManager;
use crate::stream::StreamSource;
use serde_json::{json, Value};
use tracing::info;

/// CLI runner
pub struct Runner {
    cli: Cli,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the CLI command
    pub async fn run(&self) -> Result<()> {
        match &self.cli.command {
            Commands::Check => self.check().await,
            Commands::Streams => {
                self.streams();
                Ok(())
            }
            Commands::Read { streams } => self.read(streams).await,
        }
    }

    /// Load configuration
    fn load_config(&self) -> Result<TapConfig> {
        // Inline config takes precedence
        let config = if let Some(json_str) = &self.cli.config_json {
            TapConfig::from_json(json_str)
                .map_err(|e| Error::config(format!("Invalid config JSON: {e}")))?
        } else if let Some(path) = &self.cli.config {
            TapConfig::from_file(path)?
        } else {
            return Err(Error::config(
                "No configuration given (use --config or --config-json)",
            ));
        };

        config.validate()?;
        Ok(config)
    }

    /// Load state
    fn load_state(&self) -> Result<StateManager> {
        // Inline state takes precedence
        if let Some(state_json) = &self.cli.state_json {
            StateManager::from_json(state_json)
        } else if let Some(path) = &self.cli.state {
            StateManager::from_file(path)
        } else {
            Ok(StateManager::in_memory())
        }
    }

    /// Check connection
    async fn check(&self) -> Result<()> {
        let config = self.load_config()?;
        let client = HttpClient::for_tap(&config)?;

        info!("Checking connection to {}", config.api_url);
        let status = match client.authenticator() {
            Some(auth) => match auth.acquire().await {
                Ok(_) => {
                    auth.logout().await;
                    json!({"status": "SUCCEEDED", "message": "Login successful"})
                }
                Err(e) => json!({"status": "FAILED", "message": format!("Connection failed: {e}")}),
            },
            None => json!({"status": "FAILED", "message": "No authenticator configured"}),
        };

        self.output_message(&json!({
            "type": "CONNECTION_STATUS",
            "connectionStatus": status
        }));
        Ok(())
    }

    /// List the catalog
    fn streams(&self) {
        let streams: Vec<Value> = Catalog::builtin()
            .streams()
            .iter()
            .map(|s| {
                let source = match &s.source {
                    StreamSource::Entity { path, .. } => json!({"entity": path}),
                    StreamSource::Query(q) => json!({"query": q.definition.code}),
                };
                json!({
                    "name": s.name,
                    "source": source,
                    "primary_keys": s.primary_keys,
                    "replication_key": s.replication_key,
                    "parent": s.parent,
                    "children": s.children.iter().map(|c| c.stream.as_str()).collect::<Vec<_>>(),
                })
            })
            .collect();

        self.output_message(&json!({
            "type": "STREAMS",
            "streams": streams
        }));
    }

    /// Extract the selected streams to stdout
    async fn read(&self, selected: &[String]) -> Result<()> {
        let config = self.load_config()?;
        let state = self.load_state()?;

        let mut pipeline = ExtractionPipeline::from_config(config, state)?;
        let selected: Vec<&str> = selected
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect();
        if !selected.is_empty() {
            pipeline = pipeline.with_selected_streams(selected)?;
        }

        let mut sink = JsonLinesSink::stdout();
        let result = pipeline.run(&mut sink).await;

        if let Some(auth) = pipeline.extractor().client().authenticator() {
            auth.logout().await;
        }

        let stats = result?;
        if self.cli.verbose {
            info!(
                "Synced {} records from {} stream runs ({} queries) in {}ms",
                stats.records_synced, stats.streams_synced, stats.queries_run, stats.duration_ms
            );
        }
        Ok(())
    }

    /// Print a message to stdout
    fn output_message(&self, msg: &Value) {
        if self.cli.verbose {
            println!("{}", serde_json::to_string_pretty(msg).unwrap_or_default());
        } else {
            println!("{}", serde_json::to_string(msg).unwrap_or_default());
        }
    }
}
