use livechat::adapters::postgres::Database;
use livechat::config::AppConfig;
use livechat::server::{init_tracing, Server};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    config.validate()?;

    init_tracing(&config.server)?;

    // Connect in the background; the listener does not wait for it
    let database = Database::spawn(&config.database);

    Server::new(config).with_database(database).run().await?;

    Ok(())
}
