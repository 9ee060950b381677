//! Payment rows.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgConnection;
use tracing::instrument;

use orderly_core::{Payment, TransactionId};

use super::StoreError;

/// Internal row type for payment queries.
#[derive(sqlx::FromRow)]
struct PaymentRow {
    transaction_id: TransactionId,
    request_id: String,
    currency: String,
    provider_id: String,
    amount: Decimal,
    payment_dt: DateTime<Utc>,
    bank: String,
    delivery_cost: Decimal,
    goods_total: Decimal,
    custom_fee: Decimal,
}

impl From<PaymentRow> for Payment {
    fn from(row: PaymentRow) -> Self {
        Self {
            transaction: row.transaction_id,
            request_id: row.request_id,
            currency: row.currency,
            provider: row.provider_id,
            amount: row.amount,
            payment_dt: row.payment_dt,
            bank: row.bank,
            delivery_cost: row.delivery_cost,
            goods_total: row.goods_total,
            custom_fee: row.custom_fee,
        }
    }
}

/// Insert a payment.
///
/// Duplicate transaction ids are rejected, never merged.
///
/// # Errors
///
/// Returns `StoreError::Conflict` if the transaction id already exists.
#[instrument(skip(conn, payment), fields(transaction = %payment.transaction))]
pub async fn insert_payment(conn: &mut PgConnection, payment: &Payment) -> Result<(), StoreError> {
    sqlx::query(
        r"
        INSERT INTO payments
            (transaction_id, request_id, currency, provider_id, amount, payment_dt,
             bank, delivery_cost, goods_total, custom_fee)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        ",
    )
    .bind(&payment.transaction)
    .bind(&payment.request_id)
    .bind(&payment.currency)
    .bind(&payment.provider)
    .bind(payment.amount)
    .bind(payment.payment_dt)
    .bind(&payment.bank)
    .bind(payment.delivery_cost)
    .bind(payment.goods_total)
    .bind(payment.custom_fee)
    .execute(&mut *conn)
    .await
    .map_err(|e| StoreError::from_insert(e, || format!("payment {}", payment.transaction)))?;

    Ok(())
}

/// Fetch the payment with `transaction`.
///
/// # Errors
///
/// Returns `StoreError::NotFound` if there is no such payment.
pub async fn get_payment(
    conn: &mut PgConnection,
    transaction: &TransactionId,
) -> Result<Payment, StoreError> {
    let row = sqlx::query_as::<_, PaymentRow>(
        r"
        SELECT transaction_id, request_id, currency, provider_id, amount, payment_dt,
               bank, delivery_cost, goods_total, custom_fee
        FROM payments
        WHERE transaction_id = $1
        ",
    )
    .bind(transaction)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| StoreError::not_found("payment", transaction))?;

    Ok(row.into())
}

/// Delete the payment with `transaction`.
///
/// # Errors
///
/// Returns `StoreError::Database` if the delete fails.
pub async fn delete_payment(
    conn: &mut PgConnection,
    transaction: &TransactionId,
) -> Result<(), StoreError> {
    sqlx::query("DELETE FROM payments WHERE transaction_id = $1")
        .bind(transaction)
        .execute(&mut *conn)
        .await?;

    Ok(())
}
