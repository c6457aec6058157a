pub mod config;
pub mod models;
pub mod metrics;
pub mod session;
pub mod pipeline;
pub mod report;
pub mod console;

use tracing_subscriber::EnvFilter;

use config::ServiceConfig;
use console::Console;
use pipeline::watsonx::WatsonxClient;
use pipeline::HealthAssistant;

pub fn run() {
    // Logs go to stderr so they never interleave with console output.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let service = match ServiceConfig::from_env() {
        Ok(service) => service,
        Err(e) => {
            tracing::error!(error = %e, "Configuration error, cannot start");
            std::process::exit(2);
        }
    };

    let client = match WatsonxClient::from_config(&service) {
        Ok(client) => client,
        Err(e) => {
            tracing::error!(error = %e, "Failed to initialize completion client");
            std::process::exit(1);
        }
    };

    let assistant = HealthAssistant::new(client).with_models(service.models.clone());
    let mut console = Console::new(assistant);

    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();
    if let Err(e) = console.run(stdin.lock(), &mut stdout) {
        tracing::error!(error = %e, "Console I/O failed");
        std::process::exit(1);
    }
    tracing::info!("Session ended");
}
