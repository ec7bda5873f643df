use anyhow::{Context, Result};
use follow_recommendation_service::pipeline;
use follow_recommendation_service::{Config, Neo4jGraphSource};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rec_pipeline=info,follow_recommendation_service=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(|s| s.as_str()).unwrap_or("help");
    if matches!(command, "help" | "--help" | "-h") {
        print_help();
        return Ok(());
    }

    let config = Config::from_env().context("Failed to load configuration")?;

    match command {
        "walks" => {
            let graph = connect(&config).await?;
            let corpus = pipeline::run_walks(&graph, &config).await?;
            info!(
                "Wrote {} walks to {}",
                corpus.len(),
                config.walks_path.display()
            );
        }

        "embeddings" => {
            // trains from the walks file; no graph access needed
            let table = pipeline::run_embeddings_from_saved_walks(&config)?;
            info!(
                "Wrote {} embeddings ({} dims) to {}",
                table.len(),
                table.dimension(),
                config.embeddings_path.display()
            );
        }

        "cf" => {
            let graph = connect(&config).await?;
            let table = pipeline::run_cf_pipeline(&graph, &config).await?;
            info!("Graph model ready: {} users", table.len());
        }

        "cb" => {
            let graph = connect(&config).await?;
            let model = pipeline::run_cb_pipeline(&graph, &config).await?;
            info!("Content model ready: {} users", model.len());
        }

        "all" => {
            let graph = connect(&config).await?;
            let table = pipeline::run_cf_pipeline(&graph, &config).await?;
            let model = pipeline::run_cb_pipeline(&graph, &config).await?;
            info!(
                "All models ready: {} embedded users, {} featurized users",
                table.len(),
                model.len()
            );
        }

        other => {
            error!("Unknown command: {}", other);
            print_help();
            std::process::exit(1);
        }
    }

    Ok(())
}

async fn connect(config: &Config) -> Result<Neo4jGraphSource> {
    let settings = config.neo4j().context("Neo4j is not configured")?;
    info!("Connecting to Neo4j: {}", settings.uri);
    Neo4jGraphSource::connect(&settings).await
}

fn print_help() {
    println!("rec-pipeline: build follow-recommendation model artifacts");
    println!();
    println!("Usage: rec-pipeline <command>");
    println!();
    println!("Commands:");
    println!("  walks        Sample random walks from the follow graph");
    println!("  embeddings   Train graph embeddings from the saved walks");
    println!("  cf           walks + embeddings");
    println!("  cb           Build the content-based feature model");
    println!("  all          cf + cb");
    println!();
    println!("Configuration is read from the environment (and .env):");
    println!("  NEO4J_URI, NEO4J_USERNAME, NEO4J_PASSWORD   required for graph access");
    println!("  WALK_LENGTH, WALKS_PER_NODE, RANDOM_SEED, WALK_STRATEGY");
    println!("  VECTOR_SIZE, WINDOW, MIN_COUNT, TRAINING_OBJECTIVE, EPOCHS");
    println!("  EMBEDDINGS_PATH, WALKS_PATH, CB_MODEL_PATH");
}
