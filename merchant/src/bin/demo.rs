//! Walks through the outbound API against the configured outlet: lists the
//! payment systems, creates a direct payment, prints the payment links and
//! fetches the status of the new order.

use anyhow::Context;
use env_logger::Env;
use envconfig::Envconfig;
use log::debug;
use merchant::{
    GatewayClient, GatewayConfig, ParamSet, PaymentNotificationHandler, gateway::PaymentRequest,
};
use std::sync::Arc;

#[derive(Envconfig)]
struct DemoConfig {
    #[envconfig(from = "LOG_LEVEL", default = "info")]
    log_level: log::Level,

    #[envconfig(from = "DEMO_ORDER_ID", default = "1001")]
    order_id: u64,

    #[envconfig(from = "DEMO_AMOUNT", default = "100")]
    amount: f64,

    #[envconfig(from = "DEMO_PAYMENT_SYSTEM", default = "TEST")]
    payment_system: String,

    #[envconfig(from = "DEMO_CLIENT_IP", default = "127.0.0.1")]
    client_ip: String,

    #[envconfig(nested)]
    gateway: GatewayConfig,
}

/// The demo never receives notifications.
struct NoNotifications;

impl PaymentNotificationHandler for NoNotifications {
    fn on_success(&self, order_id: &str, _params: &ParamSet) {
        debug!("Ignoring success notification for order {}", order_id);
    }

    fn on_fail(&self, order_id: &str, _params: &ParamSet) {
        debug!("Ignoring fail notification for order {}", order_id);
    }
}

fn print_output(header: &str, params: &ParamSet) -> anyhow::Result<()> {
    println!("== {header}");
    println!("{}", serde_json::to_string_pretty(params)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let config = DemoConfig::init_from_env().context("Failed to load configuration")?;
    env_logger::Builder::from_env(Env::default().default_filter_or(config.log_level.as_str()))
        .init();

    let gateway = GatewayClient::try_new(&config.gateway, Arc::new(NoNotifications))?;

    let payment = PaymentRequest::new(config.order_id, config.amount, "Test payment")
        .with_client_name("John Smith")
        .with_client_email("john.smith@example.com")
        .with_client_phone("79000000000")
        .with_client_ip(config.client_ip.clone())
        .with_payment_system(config.payment_system.clone());

    let systems = gateway
        .payment_systems(config.amount)
        .await
        .context("Failed to list payment systems")?;
    print_output("Available payment systems", &systems)?;

    let direct = gateway
        .direct_payment(&payment)
        .await
        .context("Failed to create direct payment")?;
    print_output("Redirect data for the payer", &direct)?;

    if let Some(link) = direct.get_string("sp_redirect_url") {
        println!("== Payment page: {link}");
    }
    println!("== Hosted checkout: {}", gateway.payment_redirect_url(&payment));

    let status = gateway
        .order_status_by_order_id(config.order_id)
        .await
        .context("Failed to fetch order status")?;
    print_output("Created payment", &status)?;

    Ok(())
}
