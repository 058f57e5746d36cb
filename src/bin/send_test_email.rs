//! Sends a test lead notification through the configured EmailJS relay.
//!
//! Usage: `send-test-email <to-address> [message]`

use rust_lead_capture_api::config::Config;
use rust_lead_capture_api::email_client::EmailClient;
use rust_lead_capture_api::sanitize::sanitize_email;
use std::env;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let mut args = env::args().skip(1);
    let to_email = args
        .next()
        .ok_or_else(|| anyhow::anyhow!("Usage: send-test-email <to-address> [message]"))?;
    let to_email = sanitize_email(&to_email)?;
    let message = args
        .next()
        .unwrap_or_else(|| "This is a test email from the lead capture API".to_string());

    let config = Config::from_env()?;
    let client = EmailClient::from_config(&config)?;

    let response = client
        .send_test_email(&to_email, &message, &config.brand_name)
        .await?;

    println!("Test email sent to {}: {}", to_email, response);
    Ok(())
}
