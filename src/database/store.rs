use crate::database::config_repository::ConfigRepository;
use crate::database::error::DatabaseError;
use crate::database::fallback::FallbackStore;
use crate::database::transaction_repository::{
    NewTransaction, TransactionRecord, TransactionRepository,
};
use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{info, warn};

/// Config-table key under which the provider API key is stored.
pub const PROVIDER_KEY_NAME: &str = "abacate_api_key";

/// Persistence surface used by the checkout service and the status poller.
///
/// Every method degrades instead of erroring: the payment succeeds or fails
/// independently of whether the record-keeping store is reachable, so
/// persistence problems are logged and absorbed here, never surfaced. A
/// trait so the orchestrator and tests can supply fakes.
#[async_trait]
pub trait CheckoutStore: Send + Sync {
    /// Provider key from the remote config table, falling back to the
    /// local store when the table is missing or the read fails for any
    /// other reason. None when neither source has a value.
    async fn get_provider_key(&self) -> Option<String>;

    /// Upsert the provider key remotely; on a missing table (or any
    /// unexpected remote failure) write the local fallback instead. A
    /// successful remote write deletes any stale fallback value.
    async fn save_provider_key(&self, key: &str);

    /// Fire-and-forget insert of the transaction history record.
    async fn save_transaction(&self, tx: &NewTransaction);

    /// Fire-and-forget status update by provider billing id.
    async fn update_transaction_status(&self, billing_id: &str, status: &str);
}

// ---------------------------------------------------------------------------
// Remote backends
// ---------------------------------------------------------------------------

/// Remote key/value half of the store. Boxed behind `PostgresStore` so the
/// degrade logic can be exercised against failing backends.
#[async_trait]
trait ConfigBackend: Send + Sync {
    async fn get_value(&self, key: &str) -> Result<Option<String>, DatabaseError>;
    async fn upsert_value(&self, key: &str, value: &str) -> Result<(), DatabaseError>;
}

#[async_trait]
impl ConfigBackend for ConfigRepository {
    async fn get_value(&self, key: &str) -> Result<Option<String>, DatabaseError> {
        ConfigRepository::get_value(self, key).await
    }

    async fn upsert_value(&self, key: &str, value: &str) -> Result<(), DatabaseError> {
        ConfigRepository::upsert_value(self, key, value).await
    }
}

/// Remote transaction-history half of the store.
#[async_trait]
trait TransactionBackend: Send + Sync {
    async fn insert(&self, tx: &NewTransaction) -> Result<TransactionRecord, DatabaseError>;
    async fn update_status_by_billing_id(
        &self,
        billing_id: &str,
        status: &str,
    ) -> Result<(), DatabaseError>;
}

#[async_trait]
impl TransactionBackend for TransactionRepository {
    async fn insert(&self, tx: &NewTransaction) -> Result<TransactionRecord, DatabaseError> {
        TransactionRepository::insert(self, tx).await
    }

    async fn update_status_by_billing_id(
        &self,
        billing_id: &str,
        status: &str,
    ) -> Result<(), DatabaseError> {
        TransactionRepository::update_status_by_billing_id(self, billing_id, status).await
    }
}

// ---------------------------------------------------------------------------
// Production store
// ---------------------------------------------------------------------------

/// Production store: Postgres repositories plus the file fallback.
pub struct PostgresStore {
    config_repo: Box<dyn ConfigBackend>,
    tx_repo: Box<dyn TransactionBackend>,
    fallback: FallbackStore,
}

impl PostgresStore {
    pub fn new(pool: PgPool, fallback: FallbackStore) -> Self {
        Self {
            config_repo: Box::new(ConfigRepository::new(pool.clone())),
            tx_repo: Box::new(TransactionRepository::new(pool)),
            fallback,
        }
    }

    #[cfg(test)]
    fn from_parts(
        config_repo: Box<dyn ConfigBackend>,
        tx_repo: Box<dyn TransactionBackend>,
        fallback: FallbackStore,
    ) -> Self {
        Self {
            config_repo,
            tx_repo,
            fallback,
        }
    }
}

#[async_trait]
impl CheckoutStore for PostgresStore {
    async fn get_provider_key(&self) -> Option<String> {
        match self.config_repo.get_value(PROVIDER_KEY_NAME).await {
            Ok(Some(key)) => Some(key),
            Ok(None) => self.fallback.read().await,
            Err(e) => {
                if e.is_table_missing() {
                    info!("app_config table missing, reading provider key from fallback");
                } else {
                    warn!(error = %e, "provider key read failed, trying fallback");
                }
                self.fallback.read().await
            }
        }
    }

    async fn save_provider_key(&self, key: &str) {
        match self.config_repo.upsert_value(PROVIDER_KEY_NAME, key).await {
            Ok(()) => {
                // The remote store is now the single source of truth; a
                // surviving local value would shadow later remote updates.
                self.fallback.clear().await;
            }
            Err(e) => {
                if e.is_table_missing() {
                    info!("app_config table missing, saving provider key to fallback");
                } else {
                    warn!(error = %e, "provider key save failed, using fallback");
                }
                self.fallback.write(key).await;
            }
        }
    }

    async fn save_transaction(&self, tx: &NewTransaction) {
        match self.tx_repo.insert(tx).await {
            Ok(record) => {
                info!(
                    transaction_id = %record.id,
                    billing_id = %record.abacate_billing_id,
                    "transaction recorded"
                );
            }
            Err(e) if e.is_table_missing() => {
                warn!("transactions table missing, checkout continues without history");
            }
            Err(e) => {
                warn!(
                    billing_id = %tx.abacate_billing_id,
                    error = %e,
                    "transaction save failed, checkout continues"
                );
            }
        }
    }

    async fn update_transaction_status(&self, billing_id: &str, status: &str) {
        if let Err(e) = self
            .tx_repo
            .update_status_by_billing_id(billing_id, status)
            .await
        {
            warn!(
                billing_id = %billing_id,
                status = %status,
                error = %e,
                "transaction status update failed"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use uuid::Uuid;

    fn temp_fallback() -> (FallbackStore, PathBuf) {
        let path = std::env::temp_dir().join(format!("pix-key-{}.txt", Uuid::new_v4()));
        (FallbackStore::new(path.clone()), path)
    }

    fn schema_missing() -> DatabaseError {
        DatabaseError::SchemaMissing {
            code: "42P01".to_string(),
            message: "relation \"app_config\" does not exist".to_string(),
        }
    }

    /// Config backend that fails the way a not-yet-migrated database does.
    struct MissingTableConfig;

    #[async_trait]
    impl ConfigBackend for MissingTableConfig {
        async fn get_value(&self, _key: &str) -> Result<Option<String>, DatabaseError> {
            Err(schema_missing())
        }

        async fn upsert_value(&self, _key: &str, _value: &str) -> Result<(), DatabaseError> {
            Err(schema_missing())
        }
    }

    /// Config backend that accepts everything and remembers the last upsert.
    #[derive(Default)]
    struct HealthyConfig {
        value: Mutex<Option<String>>,
    }

    #[async_trait]
    impl ConfigBackend for HealthyConfig {
        async fn get_value(&self, _key: &str) -> Result<Option<String>, DatabaseError> {
            Ok(self.value.lock().unwrap().clone())
        }

        async fn upsert_value(&self, _key: &str, value: &str) -> Result<(), DatabaseError> {
            *self.value.lock().unwrap() = Some(value.to_string());
            Ok(())
        }
    }

    struct MissingTableTransactions;

    #[async_trait]
    impl TransactionBackend for MissingTableTransactions {
        async fn insert(
            &self,
            _tx: &NewTransaction,
        ) -> Result<TransactionRecord, DatabaseError> {
            Err(schema_missing())
        }

        async fn update_status_by_billing_id(
            &self,
            _billing_id: &str,
            _status: &str,
        ) -> Result<(), DatabaseError> {
            Err(schema_missing())
        }
    }

    /// Transaction backend that succeeds and echoes the inserted record.
    struct HealthyTransactions;

    #[async_trait]
    impl TransactionBackend for HealthyTransactions {
        async fn insert(&self, tx: &NewTransaction) -> Result<TransactionRecord, DatabaseError> {
            Ok(TransactionRecord {
                id: Uuid::new_v4(),
                customer_name: tx.customer_name.clone(),
                customer_email: tx.customer_email.clone(),
                customer_cpf: tx.customer_cpf.clone(),
                abacate_billing_id: tx.abacate_billing_id.clone(),
                pix_code: tx.pix_code.clone(),
                pix_url: tx.pix_url.clone(),
                amount: tx.amount,
                status: tx.status.clone(),
                created_at: Utc::now(),
            })
        }

        async fn update_status_by_billing_id(
            &self,
            _billing_id: &str,
            _status: &str,
        ) -> Result<(), DatabaseError> {
            Ok(())
        }
    }

    fn sample_transaction() -> NewTransaction {
        NewTransaction {
            customer_name: "Maria Silva".to_string(),
            customer_email: "maria@example.com".to_string(),
            customer_cpf: "12345678909".to_string(),
            abacate_billing_id: "bill_1".to_string(),
            pix_code: "000201sample".to_string(),
            pix_url: None,
            amount: 150,
            status: "PENDING".to_string(),
        }
    }

    #[tokio::test]
    async fn missing_table_key_read_falls_back_to_local_value() {
        let (fallback, path) = temp_fallback();
        fallback.write("sk_test_123").await;

        let store = PostgresStore::from_parts(
            Box::new(MissingTableConfig),
            Box::new(HealthyTransactions),
            fallback,
        );
        assert_eq!(store.get_provider_key().await, Some("sk_test_123".to_string()));

        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn missing_table_key_save_lands_in_the_fallback() {
        let (fallback, path) = temp_fallback();
        let store = PostgresStore::from_parts(
            Box::new(MissingTableConfig),
            Box::new(HealthyTransactions),
            fallback,
        );

        store.save_provider_key("sk_live_456").await;
        assert_eq!(store.get_provider_key().await, Some("sk_live_456".to_string()));

        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn remote_key_save_clears_a_stale_fallback() {
        let (fallback, path) = temp_fallback();
        fallback.write("sk_stale").await;

        let config = Box::new(HealthyConfig::default());
        let store = PostgresStore::from_parts(config, Box::new(HealthyTransactions), fallback);

        store.save_provider_key("sk_fresh").await;
        // The remote value wins and the shadowing local copy is gone.
        assert_eq!(store.get_provider_key().await, Some("sk_fresh".to_string()));
        assert!(!path.exists());

        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn remote_read_without_a_value_still_checks_the_fallback() {
        let (fallback, path) = temp_fallback();
        fallback.write("sk_local_only").await;

        let store = PostgresStore::from_parts(
            Box::new(HealthyConfig::default()),
            Box::new(HealthyTransactions),
            fallback,
        );
        assert_eq!(
            store.get_provider_key().await,
            Some("sk_local_only".to_string())
        );

        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn missing_transactions_table_is_absorbed() {
        let (fallback, path) = temp_fallback();
        let store = PostgresStore::from_parts(
            Box::new(HealthyConfig::default()),
            Box::new(MissingTableTransactions),
            fallback,
        );

        // Neither call panics or surfaces an error.
        store.save_transaction(&sample_transaction()).await;
        store.update_transaction_status("bill_1", "PAID").await;

        let _ = std::fs::remove_file(path);
    }
}
