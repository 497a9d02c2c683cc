use ebills::app;
use ebills::config::Config;

/// Main entry point for the web application
///
/// Loads `.env`, initializes logging, builds the configuration and starts
/// the web server. Missing configuration aborts here, before any listener
/// is bound or any network call is attempted.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    env_logger::init();

    let config = Config::from_env()?;

    app::run(config).await
}
