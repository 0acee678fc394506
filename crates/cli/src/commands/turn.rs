use std::sync::Arc;

use shopmate_agent::llm::ScriptedModel;
use shopmate_agent::{SalesPipeline, TurnRequest};
use shopmate_core::config::{AppConfig, LoadOptions};
use shopmate_store::{fixtures, InMemoryCatalog, InMemoryCouponIssuer, InMemoryTtlCache, TracingSink};

use crate::commands::CommandResult;

pub fn run(message: &str, session: &str, site: &str, reply: &str) -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "turn",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };
    crate::init_tracing(&config.logging);

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "turn",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let response = runtime.block_on(async {
        let catalog = Arc::new(InMemoryCatalog::new());
        fixtures::seed(&catalog, site).await;

        let pipeline = SalesPipeline::new(
            Arc::new(ScriptedModel::new(reply)),
            catalog,
            Arc::new(InMemoryCouponIssuer::default()),
            Arc::new(InMemoryTtlCache::new()),
            Arc::new(TracingSink),
            &config,
        );

        pipeline
            .handle_turn(TurnRequest {
                session_id: session.to_string(),
                user_id: None,
                site_id: site.to_string(),
                message: message.to_string(),
                history: Vec::new(),
            })
            .await
    });

    match serde_json::to_string_pretty(&response) {
        Ok(rendered) => CommandResult { exit_code: 0, output: rendered },
        Err(error) => CommandResult::failure(
            "turn",
            "serialization",
            format!("could not render the response: {error}"),
            4,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::run;

    #[test]
    fn turn_renders_the_response_as_json() {
        let result = run("show me all products", "cli-sess", "cli-site", "Here you go!");
        assert_eq!(result.exit_code, 0);

        let payload: serde_json::Value =
            serde_json::from_str(&result.output).expect("valid json");
        assert_eq!(payload["message"], "Here you go!");
        assert!(payload["products"].as_array().expect("products array").len() <= 12);
    }
}
