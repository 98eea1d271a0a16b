use anyhow::Result;
use econsql_common::config::AppConfig;
use econsql_server::EconServer;

pub async fn serve(mut config: AppConfig, listen: Option<String>) -> Result<()> {
    if let Some(addr) = listen {
        config.server.listen_addr = addr;
    }
    EconServer::new(config).run().await
}
