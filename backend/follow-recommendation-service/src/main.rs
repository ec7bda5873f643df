use anyhow::{bail, Context, Result};
use follow_recommendation_service::{Config, Neo4jGraphSource, RecommendationService};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn usage() -> &'static str {
    "usage: follow-recommendation-service <command>\n\
     \n\
     commands:\n\
     \x20 recommend <user_id> [k]          ranked follow suggestions (JSON)\n\
     \x20 explain <target> <candidate>     graph-model similarity breakdown (JSON)\n\
     \x20 features <user_id>               named content features (JSON)\n\
     \x20 health                           check the Neo4j connection"
}

/// Help needs neither configuration nor a database.
fn is_help(command: &str) -> bool {
    matches!(command, "help" | "--help" | "-h")
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "follow_recommendation_service=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = args.first().map(String::as_str).unwrap_or("help");
    if is_help(command) {
        println!("{}", usage());
        return Ok(());
    }

    let config = Config::from_env().context("Failed to load configuration")?;
    // missing credentials are fatal before any command runs
    let neo4j = config.neo4j().context("Neo4j is not configured")?;

    info!(
        "Starting follow-recommendation-service v{}",
        env!("CARGO_PKG_VERSION")
    );
    let graph = Neo4jGraphSource::connect(&neo4j).await?;

    if command == "health" {
        if graph.health_check().await? {
            info!("Neo4j connection OK");
            return Ok(());
        }
        bail!("Neo4j health check returned an unexpected result");
    }

    let service = RecommendationService::load(config, Arc::new(graph)).await?;

    let output = match (command, &args[1..]) {
        ("recommend", [user_id, rest @ ..]) => {
            let k = match rest.first() {
                Some(k) => Some(k.parse::<usize>().context("k must be a positive integer")?),
                None => None,
            };
            serde_json::to_string_pretty(&service.recommend(user_id, k).await?)?
        }
        ("explain", [target, candidate, ..]) => {
            serde_json::to_string_pretty(&service.explain(target, candidate).await?)?
        }
        ("features", [user_id, ..]) => {
            let recommender = service.recommender().await;
            let Some(content) = recommender.content() else {
                bail!("content-based model is not loaded");
            };
            let features: serde_json::Map<String, serde_json::Value> = content
                .describe_user(user_id)
                .await?
                .into_iter()
                .map(|(name, value)| (name, serde_json::json!(value)))
                .collect();
            serde_json::to_string_pretty(&features)?
        }
        _ => {
            error!("Unknown command or missing arguments: {:?}", args);
            eprintln!("{}", usage());
            std::process::exit(2);
        }
    };

    println!("{}", output);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_help_is_recognised_without_configuration() {
        assert!(is_help("help"));
        assert!(is_help("--help"));
        assert!(is_help("-h"));
        assert!(!is_help("recommend"));
        assert!(!is_help("health"));
        assert!(usage().contains("recommend <user_id>"));
    }
}
