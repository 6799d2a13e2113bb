use git_webhook_deploy::config::DeployConfig;
use git_webhook_deploy::{logging, serve};
use tracing::error;

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    let config = match DeployConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    logging::init(config.verbose_logging);
    config.log_summary();

    if let Err(e) = serve(config).await {
        error!("Server error: {}", e);
        std::process::exit(1);
    }
}
