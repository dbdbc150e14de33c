use clap::Parser;
use linkhop_gateway::cli::CLI;
use linkhop_gateway::server;
use linkhop_telemetry::TelemetryConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = CLI::parse();

    linkhop_telemetry::init(
        &TelemetryConfig::builder()
            .format(config.log_format.into())
            .build(),
    )?;

    server::run(config).await
}
