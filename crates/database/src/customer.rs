//! Customer identity operations.
//!
//! Customers are keyed by (company, phone); the unique index backs identity
//! resolution under concurrent webhook delivery. Creation races surface as
//! [`DatabaseError::AlreadyExists`] so the caller can reload the winner.

use sqlx::{SqliteConnection, SqlitePool};

use crate::error::{DatabaseError, Result};
use crate::models::Customer;

/// Fields for creating a customer on first inbound contact.
#[derive(Debug, Clone)]
pub struct NewCustomer<'a> {
    pub company_id: &'a str,
    pub phone: &'a str,
    pub name: Option<&'a str>,
    pub external_id: Option<&'a str>,
}

/// Find a customer by (company, phone).
pub async fn find_by_phone(
    conn: &mut SqliteConnection,
    company_id: &str,
    phone: &str,
) -> Result<Option<Customer>> {
    let customer = sqlx::query_as::<_, Customer>(
        r#"
        SELECT id, company_id, phone, name, external_id, created_at
        FROM customers
        WHERE company_id = ? AND phone = ?
        "#,
    )
    .bind(company_id)
    .bind(phone)
    .fetch_optional(conn)
    .await?;

    Ok(customer)
}

/// Create a new customer.
pub async fn create_customer(
    conn: &mut SqliteConnection,
    new: NewCustomer<'_>,
) -> Result<Customer> {
    let id = crate::new_id();
    sqlx::query(
        r#"
        INSERT INTO customers (id, company_id, phone, name, external_id)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(new.company_id)
    .bind(new.phone)
    .bind(new.name)
    .bind(new.external_id)
    .execute(&mut *conn)
    .await
    .map_err(|e| {
        if let sqlx::Error::Database(ref db_err) = e {
            if db_err.is_unique_violation() {
                return DatabaseError::AlreadyExists {
                    entity: "Customer",
                    key: format!("{}/{}", new.company_id, new.phone),
                };
            }
        }
        DatabaseError::Sqlx(e)
    })?;

    sqlx::query_as::<_, Customer>(
        r#"
        SELECT id, company_id, phone, name, external_id, created_at
        FROM customers
        WHERE id = ?
        "#,
    )
    .bind(&id)
    .fetch_one(conn)
    .await
    .map_err(DatabaseError::Sqlx)
}

/// Get a customer by ID.
pub async fn get_customer(pool: &SqlitePool, id: &str) -> Result<Customer> {
    sqlx::query_as::<_, Customer>(
        r#"
        SELECT id, company_id, phone, name, external_id, created_at
        FROM customers
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DatabaseError::NotFound {
        entity: "Customer",
        id: id.to_string(),
    })
}
