use std::env;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use dotenv::dotenv;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use pix_checkout::config::AppConfig;
use pix_checkout::database::fallback::FallbackStore;
use pix_checkout::database::init_pool_from_config;
use pix_checkout::database::store::{CheckoutStore, PostgresStore};
use pix_checkout::payments::providers::AbacatePayProvider;
use pix_checkout::{CheckoutService, CheckoutState, Customer};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    dotenv().ok();

    let config = AppConfig::from_env().context("loading configuration")?;
    config.validate().context("validating configuration")?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "starting pix-checkout demo session"
    );

    let pool = init_pool_from_config(&config.database)
        .await
        .context("initializing database pool")?;

    let store = Arc::new(PostgresStore::new(
        pool,
        FallbackStore::new(config.fallback.key_path.clone()),
    ));

    // Optional one-shot key seeding; the remote config table (or its
    // fallback) stays the system of record afterwards.
    if let Ok(key) = env::var("ABACATE_API_KEY") {
        if !key.trim().is_empty() {
            store.save_provider_key(key.trim()).await;
            info!("provider API key saved");
        }
    }

    let provider = Arc::new(
        AbacatePayProvider::new(config.provider.clone())
            .map_err(|e| anyhow::anyhow!(e.to_string()))
            .context("initializing provider client")?,
    );

    let service = CheckoutService::new(provider, store, config.poller.clone());

    let customer = customer_from_env()?;
    let amount_cents: i64 = env::var("AMOUNT_CENTS")
        .unwrap_or_else(|_| "150".to_string())
        .parse()
        .context("AMOUNT_CENTS must be an integer number of cents")?;

    let transaction = match service.submit(customer, amount_cents).await {
        Ok(tx) => tx,
        Err(e) => {
            anyhow::bail!("checkout failed: {}", e.user_message());
        }
    };

    println!("Billing created: {}", transaction.billing_id);
    println!("Pix copy-paste code:\n{}", transaction.pix_code);
    if let Some(url) = &transaction.pix_url {
        println!("Payment page: {}", url);
    }
    println!("Waiting for payment confirmation (ctrl-c to cancel)...");

    loop {
        tokio::select! {
            _ = signal::ctrl_c() => {
                warn!("interrupted, cancelling checkout");
                service.cancel();
                println!("Checkout cancelled.");
                break;
            }
            _ = tokio::time::sleep(Duration::from_secs(1)) => {
                let snapshot = service.snapshot();
                match snapshot.state {
                    CheckoutState::Paid => {
                        println!("Payment confirmed.");
                        break;
                    }
                    CheckoutState::Failed => {
                        println!(
                            "Payment failed: {}",
                            snapshot.error.unwrap_or_else(|| "unknown reason".to_string())
                        );
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    Ok(())
}

fn customer_from_env() -> anyhow::Result<Customer> {
    Ok(Customer {
        name: env::var("CUSTOMER_NAME").context("CUSTOMER_NAME must be set")?,
        email: env::var("CUSTOMER_EMAIL").context("CUSTOMER_EMAIL must be set")?,
        cellphone: env::var("CUSTOMER_CELLPHONE").context("CUSTOMER_CELLPHONE must be set")?,
        tax_id: env::var("CUSTOMER_TAX_ID").context("CUSTOMER_TAX_ID must be set")?,
    })
}
