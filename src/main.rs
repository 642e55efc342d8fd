use tracing::{error, info};

use sharebox::{Config, Database};

#[tokio::main]
async fn main() {
    let config = match Config::load_with_env("config.toml") {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config.toml: {e}");
            eprintln!("Using default configuration.");
            let mut config = Config::default();
            config.apply_env_overrides();
            config
        }
    };

    if let Err(e) = sharebox::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        sharebox::logging::init_console_only(&config.logging.level);
    }

    if let Err(e) = config.validate() {
        error!("Invalid configuration: {e}");
        std::process::exit(1);
    }

    info!("sharebox file registry");

    let db = match Database::open_with_config(&config.database).await {
        Ok(db) => db,
        Err(e) => {
            error!("Failed to open database: {e}");
            std::process::exit(1);
        }
    };

    match db.schema_version().await {
        Ok(version) => info!("Database ready at {} (schema v{})", config.database.path, version),
        Err(e) => error!("Failed to read schema version: {e}"),
    }

    db.close().await;
}
