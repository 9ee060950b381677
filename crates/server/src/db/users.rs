//! Delivery recipients and their addresses.
//!
//! Recipients are upserted by phone number; addresses are append-only and
//! never deduplicated, so every ingestion adds one address row.

use sqlx::PgConnection;
use tracing::{debug, instrument};

use orderly_core::{Address, AddressId, Delivery, PhoneNumber};

use super::StoreError;

/// A row of the `users` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRow {
    pub phonenumber: PhoneNumber,
    pub name: String,
    pub email: String,
    pub address_id: AddressId,
}

impl UserRow {
    /// Combine the user with its loaded address.
    #[must_use]
    pub fn into_delivery(self, address: Address) -> Delivery {
        Delivery {
            name: self.name,
            phone: self.phonenumber,
            address,
            email: self.email,
            address_id: Some(self.address_id),
        }
    }
}

/// Internal row type for address queries.
#[derive(sqlx::FromRow)]
struct AddressRow {
    zipcode: String,
    city: String,
    address: String,
    region: String,
}

/// Insert an address and return its generated id.
///
/// # Errors
///
/// Returns `StoreError::Database` if the insert fails.
#[instrument(skip_all)]
pub async fn insert_address(
    conn: &mut PgConnection,
    address: &Address,
) -> Result<AddressId, StoreError> {
    let (id,): (i64,) = sqlx::query_as(
        r"
        INSERT INTO addresses (zipcode, city, address, region)
        VALUES ($1, $2, $3, $4)
        RETURNING id
        ",
    )
    .bind(&address.zipcode)
    .bind(&address.city)
    .bind(&address.street)
    .bind(&address.region)
    .fetch_one(&mut *conn)
    .await?;

    debug!(address_id = id, "Inserted address");
    Ok(AddressId::new(id))
}

/// Insert the recipient, or overwrite name, email and address of an existing
/// recipient with the same phone number.
///
/// # Errors
///
/// Returns `StoreError::Database` if the upsert fails.
#[instrument(skip(conn, delivery), fields(phone = %delivery.phone))]
pub async fn upsert_user(
    conn: &mut PgConnection,
    delivery: &Delivery,
    address_id: AddressId,
) -> Result<(), StoreError> {
    sqlx::query(
        r"
        INSERT INTO users (phonenumber, name, email, address_id)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (phonenumber) DO UPDATE
        SET name = EXCLUDED.name,
            email = EXCLUDED.email,
            address_id = EXCLUDED.address_id
        ",
    )
    .bind(&delivery.phone)
    .bind(&delivery.name)
    .bind(&delivery.email)
    .bind(address_id)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Fetch the recipient with `phone`.
///
/// # Errors
///
/// Returns `StoreError::NotFound` if there is no such recipient.
pub async fn get_user(conn: &mut PgConnection, phone: &PhoneNumber) -> Result<UserRow, StoreError> {
    sqlx::query_as::<_, UserRow>(
        "SELECT phonenumber, name, email, address_id FROM users WHERE phonenumber = $1",
    )
    .bind(phone)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| StoreError::not_found("user", phone))
}

/// Fetch the address with `id`.
///
/// # Errors
///
/// Returns `StoreError::NotFound` if there is no such address.
pub async fn get_address(conn: &mut PgConnection, id: AddressId) -> Result<Address, StoreError> {
    let row = sqlx::query_as::<_, AddressRow>(
        "SELECT zipcode, city, address, region FROM addresses WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| StoreError::not_found("address", id))?;

    Ok(Address {
        zipcode: row.zipcode,
        city: row.city,
        street: row.address,
        region: row.region,
    })
}
