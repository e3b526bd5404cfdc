use crate::database::error::DatabaseError;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// Transaction record as stored (id and created_at assigned by the database).
#[derive(Debug, Clone, FromRow)]
pub struct TransactionRecord {
    pub id: Uuid,
    pub customer_name: String,
    pub customer_email: String,
    /// Digits-only CPF; display punctuation is stripped before persisting.
    pub customer_cpf: String,
    pub abacate_billing_id: String,
    pub pix_code: String,
    pub pix_url: Option<String>,
    /// Integer minor currency units (cents).
    pub amount: i64,
    pub status: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Transaction fields for INSERT.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub customer_name: String,
    pub customer_email: String,
    pub customer_cpf: String,
    pub abacate_billing_id: String,
    pub pix_code: String,
    pub pix_url: Option<String>,
    pub amount: i64,
    pub status: String,
}

/// Repository for checkout transaction history.
pub struct TransactionRepository {
    pool: PgPool,
}

impl TransactionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, tx: &NewTransaction) -> Result<TransactionRecord, DatabaseError> {
        sqlx::query_as::<_, TransactionRecord>(
            "INSERT INTO transactions
             (customer_name, customer_email, customer_cpf, abacate_billing_id,
              pix_code, pix_url, amount, status)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING id, customer_name, customer_email, customer_cpf,
                       abacate_billing_id, pix_code, pix_url, amount, status, created_at",
        )
        .bind(&tx.customer_name)
        .bind(&tx.customer_email)
        .bind(&tx.customer_cpf)
        .bind(&tx.abacate_billing_id)
        .bind(&tx.pix_code)
        .bind(&tx.pix_url)
        .bind(tx.amount)
        .bind(&tx.status)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    /// Update by provider billing id; the poller knows the billing id, not
    /// the row id.
    pub async fn update_status_by_billing_id(
        &self,
        billing_id: &str,
        status: &str,
    ) -> Result<(), DatabaseError> {
        sqlx::query(
            "UPDATE transactions
             SET status = $2
             WHERE abacate_billing_id = $1",
        )
        .bind(billing_id)
        .bind(status)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        Ok(())
    }

    pub async fn find_by_billing_id(
        &self,
        billing_id: &str,
    ) -> Result<Option<TransactionRecord>, DatabaseError> {
        sqlx::query_as::<_, TransactionRecord>(
            "SELECT id, customer_name, customer_email, customer_cpf,
                    abacate_billing_id, pix_code, pix_url, amount, status, created_at
             FROM transactions
             WHERE abacate_billing_id = $1",
        )
        .bind(billing_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }
}
