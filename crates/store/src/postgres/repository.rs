use async_trait::async_trait;
use common::{OrderId, PaymentId, UserId, Version};
use domain::{ChargeDetails, HistoryEntry, Money, Payment, PaymentRecord, PaymentStatus};
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};
use uuid::Uuid;

use crate::{PaymentPage, PaymentRepository, Result, StoreError};

const SELECT_PAYMENT: &str = r#"
    SELECT id, order_id, user_id, version, status,
           total_amount, payment_amount, discount_amount, delivery_fee, method,
           created_at, requested_at, completed_at, failed_at, cancelled_at,
           refund_requested_at, refunded_at, stock_confirmed_at,
           pg_transaction_id, pg_approval_number, refund_transaction_id,
           refund_amount, refund_reason, cancellation_reason, failure_reason
    FROM payments
"#;

/// PostgreSQL-backed payment repository.
#[derive(Clone)]
pub struct PostgresPaymentRepository {
    pool: PgPool,
}

impl PostgresPaymentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn load_where(&self, column: &str, id: Uuid) -> Result<Option<Payment>> {
        let sql = format!("{SELECT_PAYMENT} WHERE {column} = $1");
        let Some(row) = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
        else {
            return Ok(None);
        };

        let payment_id: Uuid = row.try_get("id")?;
        let history = self.load_history(payment_id).await?;
        Ok(Some(Payment::from(row_to_record(&row, history)?)))
    }

    async fn load_history(&self, payment_id: Uuid) -> Result<Vec<HistoryEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT event_type, summary, recorded_at
            FROM payment_history
            WHERE payment_id = $1
            ORDER BY seq ASC
            "#,
        )
        .bind(payment_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                let event_type: String = row.try_get("event_type")?;
                Ok(HistoryEntry {
                    event_type: event_type
                        .parse()
                        .map_err(|e| StoreError::InvalidData(format!("{e}")))?,
                    summary: row.try_get("summary")?,
                    recorded_at: row.try_get("recorded_at")?,
                })
            })
            .collect()
    }

    async fn append_history(
        tx: &mut Transaction<'_, Postgres>,
        payment: &Payment,
    ) -> Result<()> {
        let stored: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM payment_history WHERE payment_id = $1")
                .bind(payment.id().as_uuid())
                .fetch_one(&mut **tx)
                .await?;

        for (seq, entry) in payment
            .history()
            .iter()
            .enumerate()
            .skip(stored as usize)
        {
            sqlx::query(
                r#"
                INSERT INTO payment_history (payment_id, seq, event_type, summary, recorded_at)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(payment.id().as_uuid())
            .bind(seq as i32)
            .bind(entry.event_type.as_str())
            .bind(&entry.summary)
            .bind(entry.recorded_at)
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }
}

fn row_to_record(row: &PgRow, history: Vec<HistoryEntry>) -> Result<PaymentRecord> {
    let status: String = row.try_get("status")?;
    let method: Option<String> = row.try_get("method")?;
    let amounts: [Option<i64>; 4] = [
        row.try_get("total_amount")?,
        row.try_get("payment_amount")?,
        row.try_get("discount_amount")?,
        row.try_get("delivery_fee")?,
    ];

    let charge = match (amounts, method) {
        ([Some(total), Some(paid), Some(discount), Some(fee)], Some(method)) => {
            let method = method
                .parse()
                .map_err(|e| StoreError::InvalidData(format!("{e}")))?;
            let charge = ChargeDetails::new(
                Money::new(total),
                Money::new(paid),
                Money::new(discount),
                Money::new(fee),
                method,
            )
            .map_err(|e| StoreError::InvalidData(format!("{e}")))?;
            Some(charge)
        }
        ([None, None, None, None], None) => None,
        _ => {
            return Err(StoreError::InvalidData(
                "charge columns are partially set".to_string(),
            ));
        }
    };

    Ok(PaymentRecord {
        id: PaymentId::from_uuid(row.try_get("id")?),
        order_id: OrderId::from_uuid(row.try_get("order_id")?),
        user_id: UserId::from_uuid(row.try_get("user_id")?),
        version: Version::new(row.try_get("version")?),
        status: status
            .parse()
            .map_err(|e| StoreError::InvalidData(format!("{e}")))?,
        charge,
        created_at: row.try_get("created_at")?,
        requested_at: row.try_get("requested_at")?,
        completed_at: row.try_get("completed_at")?,
        failed_at: row.try_get("failed_at")?,
        cancelled_at: row.try_get("cancelled_at")?,
        refund_requested_at: row.try_get("refund_requested_at")?,
        refunded_at: row.try_get("refunded_at")?,
        stock_confirmed_at: row.try_get("stock_confirmed_at")?,
        pg_transaction_id: row.try_get("pg_transaction_id")?,
        pg_approval_number: row.try_get("pg_approval_number")?,
        refund_transaction_id: row.try_get("refund_transaction_id")?,
        refund_amount: row
            .try_get::<Option<i64>, _>("refund_amount")?
            .map(Money::new),
        refund_reason: row.try_get("refund_reason")?,
        cancellation_reason: row.try_get("cancellation_reason")?,
        failure_reason: row.try_get("failure_reason")?,
        history,
    })
}

#[async_trait]
impl PaymentRepository for PostgresPaymentRepository {
    async fn load_by_id(&self, id: PaymentId) -> Result<Option<Payment>> {
        self.load_where("id", id.as_uuid()).await
    }

    async fn load_by_order_id(&self, order_id: OrderId) -> Result<Option<Payment>> {
        self.load_where("order_id", order_id.as_uuid()).await
    }

    async fn list_by_user(
        &self,
        user_id: UserId,
        status: Option<PaymentStatus>,
        page: u32,
        limit: u32,
    ) -> Result<PaymentPage> {
        const FILTER: &str = "WHERE user_id = $1 AND ($2::TEXT IS NULL OR status = $2)";
        let status = status.map(|s| s.as_str());

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM payments {FILTER}"))
            .bind(user_id.as_uuid())
            .bind(status)
            .fetch_one(&self.pool)
            .await?;

        let offset = i64::from(page.saturating_sub(1)) * i64::from(limit);
        let sql = format!("{SELECT_PAYMENT} {FILTER} ORDER BY created_at DESC, id LIMIT $3 OFFSET $4");
        let rows = sqlx::query(&sql)
            .bind(user_id.as_uuid())
            .bind(status)
            .bind(i64::from(limit))
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        let mut payments = Vec::with_capacity(rows.len());
        for row in rows {
            let history = self.load_history(row.try_get("id")?).await?;
            payments.push(Payment::from(row_to_record(&row, history)?));
        }

        Ok(PaymentPage {
            payments,
            total: total as u64,
        })
    }

    async fn save(&self, payment: &Payment) -> Result<Payment> {
        let expected = payment.version();
        let next = expected.next();
        let record = PaymentRecord::from(payment);
        let charge = record.charge;

        let mut tx = self.pool.begin().await?;

        // Inserts a new payment, or updates it only if the stored version
        // still matches the one it was loaded at.
        let result = sqlx::query(
            r#"
            INSERT INTO payments (
                id, order_id, user_id, version, status,
                total_amount, payment_amount, discount_amount, delivery_fee, method,
                created_at, requested_at, completed_at, failed_at, cancelled_at,
                refund_requested_at, refunded_at, stock_confirmed_at,
                pg_transaction_id, pg_approval_number, refund_transaction_id,
                refund_amount, refund_reason, cancellation_reason, failure_reason
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13,
                    $14, $15, $16, $17, $18, $19, $20, $21, $22, $23, $24, $25)
            ON CONFLICT (id) DO UPDATE SET
                version = EXCLUDED.version,
                status = EXCLUDED.status,
                total_amount = EXCLUDED.total_amount,
                payment_amount = EXCLUDED.payment_amount,
                discount_amount = EXCLUDED.discount_amount,
                delivery_fee = EXCLUDED.delivery_fee,
                method = EXCLUDED.method,
                requested_at = EXCLUDED.requested_at,
                completed_at = EXCLUDED.completed_at,
                failed_at = EXCLUDED.failed_at,
                cancelled_at = EXCLUDED.cancelled_at,
                refund_requested_at = EXCLUDED.refund_requested_at,
                refunded_at = EXCLUDED.refunded_at,
                stock_confirmed_at = EXCLUDED.stock_confirmed_at,
                pg_transaction_id = EXCLUDED.pg_transaction_id,
                pg_approval_number = EXCLUDED.pg_approval_number,
                refund_transaction_id = EXCLUDED.refund_transaction_id,
                refund_amount = EXCLUDED.refund_amount,
                refund_reason = EXCLUDED.refund_reason,
                cancellation_reason = EXCLUDED.cancellation_reason,
                failure_reason = EXCLUDED.failure_reason
            WHERE payments.version = $26
            "#,
        )
        .bind(record.id.as_uuid())
        .bind(record.order_id.as_uuid())
        .bind(record.user_id.as_uuid())
        .bind(next.as_i64())
        .bind(record.status.as_str())
        .bind(charge.map(|c| c.total_amount().amount()))
        .bind(charge.map(|c| c.payment_amount().amount()))
        .bind(charge.map(|c| c.discount_amount().amount()))
        .bind(charge.map(|c| c.delivery_fee().amount()))
        .bind(charge.map(|c| c.method().as_str()))
        .bind(record.created_at)
        .bind(record.requested_at)
        .bind(record.completed_at)
        .bind(record.failed_at)
        .bind(record.cancelled_at)
        .bind(record.refund_requested_at)
        .bind(record.refunded_at)
        .bind(record.stock_confirmed_at)
        .bind(&record.pg_transaction_id)
        .bind(&record.pg_approval_number)
        .bind(&record.refund_transaction_id)
        .bind(record.refund_amount.map(|m| m.amount()))
        .bind(&record.refund_reason)
        .bind(&record.cancellation_reason)
        .bind(&record.failure_reason)
        .bind(expected.as_i64())
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.constraint() == Some("unique_payment_order")
            {
                return StoreError::DuplicateOrder(record.order_id);
            }
            StoreError::Database(e)
        })?;

        if result.rows_affected() == 0 {
            let actual: i64 = sqlx::query_scalar("SELECT version FROM payments WHERE id = $1")
                .bind(record.id.as_uuid())
                .fetch_one(&mut *tx)
                .await?;
            return Err(StoreError::ConcurrencyConflict {
                payment_id: record.id,
                expected,
                actual: Version::new(actual),
            });
        }

        Self::append_history(&mut tx, payment).await?;
        tx.commit().await?;

        let mut saved = record;
        saved.version = next;
        Ok(Payment::from(saved))
    }
}
