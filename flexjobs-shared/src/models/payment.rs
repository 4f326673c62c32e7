/// Stored payment methods and billing addresses
///
/// Payments are simulated, so a method is only descriptive card data. A user
/// has at most one default method (among active ones) and at most one
/// default address; partial unique indexes enforce both. Every operation
/// that moves the default clears the old one and sets the new one inside a
/// single transaction, so the index never sees two defaults.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};

use crate::db::query::Changes;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentType {
    CreditCard,
    DebitCard,
    Paypal,
    BankTransfer,
}

impl PaymentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentType::CreditCard => "credit_card",
            PaymentType::DebitCard => "debit_card",
            PaymentType::Paypal => "paypal",
            PaymentType::BankTransfer => "bank_transfer",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PaymentMethod {
    pub id: i64,
    pub user_id: i64,
    pub payment_type: String,
    pub card_brand: Option<String>,
    pub last_four_digits: String,
    pub cardholder_name: String,
    pub expiry_month: i32,
    pub expiry_year: i32,
    pub billing_address_line1: Option<String>,
    pub billing_address_line2: Option<String>,
    pub billing_city: Option<String>,
    pub billing_state: Option<String>,
    pub billing_postal_code: Option<String>,
    pub billing_country: String,
    pub is_default: bool,
    pub is_active: bool,
    #[serde(skip_serializing)]
    pub stripe_payment_method_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PaymentMethod {
    /// Label subscriptions record as their payment method, e.g. "Visa ****4242"
    pub fn label(&self) -> String {
        payment_label(self.card_brand.as_deref(), &self.last_four_digits)
    }
}

/// `card_brand || ' ****' || last_four_digits`, with a missing brand as empty
pub fn payment_label(card_brand: Option<&str>, last_four_digits: &str) -> String {
    format!("{} ****{}", card_brand.unwrap_or(""), last_four_digits)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePaymentMethod {
    pub payment_type: PaymentType,
    pub card_brand: Option<String>,
    pub last_four_digits: String,
    pub cardholder_name: String,
    pub expiry_month: i32,
    pub expiry_year: i32,
    pub billing_address_line1: Option<String>,
    pub billing_address_line2: Option<String>,
    pub billing_city: Option<String>,
    pub billing_state: Option<String>,
    pub billing_postal_code: Option<String>,
    pub billing_country: String,
    pub is_default: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct BillingAddress {
    pub id: i64,
    pub user_id: i64,
    pub address_name: Option<String>,
    pub address_line1: String,
    pub address_line2: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBillingAddress {
    pub address_name: Option<String>,
    pub address_line1: String,
    pub address_line2: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
    pub is_default: bool,
}

impl PaymentMethod {
    /// Active methods, default first then newest
    pub async fn list_for_user(pool: &PgPool, user_id: i64) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, PaymentMethod>(
            r#"
            SELECT * FROM user_payment_methods
            WHERE user_id = $1 AND is_active = TRUE
            ORDER BY is_default DESC, created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
    }

    /// An active method belonging to `user_id`
    pub async fn find_owned(
        conn: &mut PgConnection,
        id: i64,
        user_id: i64,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, PaymentMethod>(
            r#"
            SELECT * FROM user_payment_methods
            WHERE id = $1 AND user_id = $2 AND is_active = TRUE
            FOR UPDATE
            "#,
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(conn)
        .await
    }

    async fn clear_default(conn: &mut PgConnection, user_id: i64) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE user_payment_methods SET is_default = FALSE, updated_at = NOW()
            WHERE user_id = $1 AND is_default = TRUE
            "#,
        )
        .bind(user_id)
        .execute(conn)
        .await?;
        Ok(())
    }

    /// Inserts a method, taking over the default if requested
    pub async fn create(
        conn: &mut PgConnection,
        user_id: i64,
        data: CreatePaymentMethod,
    ) -> Result<Self, sqlx::Error> {
        if data.is_default {
            Self::clear_default(&mut *conn, user_id).await?;
        }

        sqlx::query_as::<_, PaymentMethod>(
            r#"
            INSERT INTO user_payment_methods
                (user_id, payment_type, card_brand, last_four_digits, cardholder_name,
                 expiry_month, expiry_year, billing_address_line1, billing_address_line2,
                 billing_city, billing_state, billing_postal_code, billing_country, is_default)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(data.payment_type.as_str())
        .bind(data.card_brand)
        .bind(data.last_four_digits)
        .bind(data.cardholder_name)
        .bind(data.expiry_month)
        .bind(data.expiry_year)
        .bind(data.billing_address_line1)
        .bind(data.billing_address_line2)
        .bind(data.billing_city)
        .bind(data.billing_state)
        .bind(data.billing_postal_code)
        .bind(data.billing_country)
        .bind(data.is_default)
        .fetch_one(conn)
        .await
    }

    /// Applies `changes`; a `make_default` of true moves the default here first
    pub async fn update(
        conn: &mut PgConnection,
        id: i64,
        user_id: i64,
        changes: &Changes,
        make_default: Option<bool>,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut changes = changes.clone();
        match make_default {
            Some(true) => {
                Self::clear_default(&mut *conn, user_id).await?;
                changes.set("is_default", true);
            }
            Some(false) => {
                changes.set("is_default", false);
            }
            None => {}
        }

        let mut qb = changes.update_query("user_payment_methods", "id", id);
        qb.push(" AND user_id = ").push_bind(user_id).push(" RETURNING *");
        qb.build_query_as::<PaymentMethod>().fetch_optional(conn).await
    }

    /// Makes `id` the only default method
    pub async fn set_default(
        conn: &mut PgConnection,
        id: i64,
        user_id: i64,
    ) -> Result<Option<Self>, sqlx::Error> {
        Self::clear_default(&mut *conn, user_id).await?;

        sqlx::query_as::<_, PaymentMethod>(
            r#"
            UPDATE user_payment_methods SET is_default = TRUE, updated_at = NOW()
            WHERE id = $1 AND user_id = $2 AND is_active = TRUE
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(conn)
        .await
    }

    /// Soft-deletes a method; if it was the default, the newest remaining one takes over
    ///
    /// Returns the id of the new default, if one was promoted.
    pub async fn deactivate(
        conn: &mut PgConnection,
        method: &PaymentMethod,
    ) -> Result<Option<i64>, sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE user_payment_methods
            SET is_active = FALSE, is_default = FALSE, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(method.id)
        .execute(&mut *conn)
        .await?;

        if !method.is_default {
            return Ok(None);
        }

        sqlx::query_scalar(
            r#"
            UPDATE user_payment_methods SET is_default = TRUE, updated_at = NOW()
            WHERE id = (
                SELECT id FROM user_payment_methods
                WHERE user_id = $1 AND is_active = TRUE
                ORDER BY created_at DESC, id DESC
                LIMIT 1
            )
            RETURNING id
            "#,
        )
        .bind(method.user_id)
        .fetch_optional(conn)
        .await
    }
}

impl BillingAddress {
    pub async fn list_for_user(pool: &PgPool, user_id: i64) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, BillingAddress>(
            r#"
            SELECT * FROM user_billing_addresses
            WHERE user_id = $1
            ORDER BY is_default DESC, created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
    }

    pub async fn create(
        conn: &mut PgConnection,
        user_id: i64,
        data: CreateBillingAddress,
    ) -> Result<Self, sqlx::Error> {
        if data.is_default {
            sqlx::query(
                r#"
                UPDATE user_billing_addresses SET is_default = FALSE, updated_at = NOW()
                WHERE user_id = $1 AND is_default = TRUE
                "#,
            )
            .bind(user_id)
            .execute(&mut *conn)
            .await?;
        }

        sqlx::query_as::<_, BillingAddress>(
            r#"
            INSERT INTO user_billing_addresses
                (user_id, address_name, address_line1, address_line2, city, state,
                 postal_code, country, is_default)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(data.address_name)
        .bind(data.address_line1)
        .bind(data.address_line2)
        .bind(data.city)
        .bind(data.state)
        .bind(data.postal_code)
        .bind(data.country)
        .bind(data.is_default)
        .fetch_one(conn)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_label() {
        assert_eq!(payment_label(Some("Visa"), "4242"), "Visa ****4242");
        assert_eq!(payment_label(None, "0005"), " ****0005");
    }

    #[test]
    fn test_payment_type_serde() {
        let parsed: PaymentType = serde_json::from_str("\"bank_transfer\"").unwrap();
        assert_eq!(parsed, PaymentType::BankTransfer);
        assert_eq!(parsed.as_str(), "bank_transfer");
        assert!(serde_json::from_str::<PaymentType>("\"crypto\"").is_err());
    }
}
