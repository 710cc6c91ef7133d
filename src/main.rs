use clap::Parser;
use log::{error, info};
use vigil::configuration::config::{CliArgs, Config};
use vigil::controller::controller_handler::Controller;

#[tokio::main]
async fn main() {
    // https://docs.rs/env_logger/latest/env_logger/
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .format_target(false)
        .init();

    let args = CliArgs::parse();

    info!("Importing configuration");
    let config = Config::load(&args).unwrap_or_else(|e| {
        error!("Unable to load configuration: {}", e);
        std::process::exit(1);
    });
    info!("Configuration imported successfully");

    let controller = Controller::new(config).await.unwrap_or_else(|e| {
        error!("Unable to create a controller instance: {}, exiting...", e);
        std::process::exit(1);
    });

    if let Err(e) = controller.run().await {
        error!("Error occured in the controller process: {}, exiting...", e);
        std::process::exit(1);
    }
    info!("Bye");
}
