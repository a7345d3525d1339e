use clap::Parser;
use std::process::ExitCode;
use tempo::app::App;
use tempo::cli::Args;
use tempo::config::Config;
use tempo::logging::setup_logging;
use tracing::info;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Load config and set up logging before App::new() so startup logs are
    // never silently dropped.
    let early_config: Config = {
        use figment::providers::Env;
        figment::Figment::new()
            .merge(Env::raw())
            .extract()
            .expect("failed to load config for logging setup")
    };
    setup_logging(&early_config, args.tracing);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = if cfg!(debug_assertions) {
            "development"
        } else {
            "production"
        },
        "starting tempo"
    );

    let mut app = App::new().await.expect("failed to initialize application");
    app.setup_services().expect("failed to setup services");
    app.start_services();
    app.run().await
}
