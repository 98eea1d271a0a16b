use econsql_common::config::AppConfig;
use econsql_server::EconServer;

#[derive(clap::Parser)]
struct Args {
    #[arg(long, default_value = "config/econsql.yaml")]
    config: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let args = <Args as clap::Parser>::parse();

    let app_config = AppConfig::from_file(&args.config)?;
    econsql_common::telemetry::init_tracing(&app_config.telemetry)?;

    tracing::info!(
        listen_addr = %app_config.server.listen_addr,
        store = %app_config.store.path,
        model = %app_config.model.name,
        "starting econsql server"
    );

    EconServer::new(app_config).run().await
}
