use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use xui_clients::api::XUiClient;
use xui_clients::config::PanelConfig;
use xui_clients::errors::XuiError;

#[tokio::main]
async fn main() -> Result<(), XuiError> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "xui_clients=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = PanelConfig::from_env()?;
    let mut panel_client = XUiClient::connect(&config).await?;

    for inbound in panel_client.list_inbounds().await? {
        let clients = inbound.clients()?;
        println!(
            "#{} {} ({}, port {}): {} client(s)",
            inbound.id,
            inbound.remark,
            inbound.protocol,
            inbound.port,
            clients.len()
        );
        for client in clients {
            println!("    {} enabled={}", client.email, client.enable);
        }
    }

    Ok(())
}
