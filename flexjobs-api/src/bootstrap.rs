//! Startup tasks run after migrations

use flexjobs_shared::{
    auth::password::hash_password,
    models::user::{normalize_email, CreateUser, User, UserType},
};
use sqlx::PgPool;

use crate::config::AdminSeedConfig;

/// What [`ensure_admin`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminSeedOutcome {
    Created,
    Promoted,
    Unchanged,
}

/// Makes sure the configured admin account exists
///
/// Safe to run on every start. A missing account is created with an Argon2
/// hash of the configured password. An existing one is promoted to an active
/// admin if needed, and its password is never overwritten.
pub async fn ensure_admin(pool: &PgPool, seed: &AdminSeedConfig) -> anyhow::Result<AdminSeedOutcome> {
    let email = normalize_email(&seed.email);

    let outcome = match User::find_by_email(pool, &email).await? {
        Some(user) if user.get_user_type() == Some(UserType::Admin) && user.is_active => {
            AdminSeedOutcome::Unchanged
        }
        Some(user) => {
            User::promote_admin(pool, user.id).await?;
            AdminSeedOutcome::Promoted
        }
        None => {
            let created = User::create(
                pool,
                CreateUser {
                    email: email.clone(),
                    password_hash: hash_password(&seed.password)?,
                    first_name: seed.first_name.clone(),
                    last_name: seed.last_name.clone(),
                    user_type: UserType::Admin,
                },
            )
            .await;

            match created {
                Ok(_) => AdminSeedOutcome::Created,
                // Another instance won the insert
                Err(sqlx::Error::Database(e)) if e.is_unique_violation() => AdminSeedOutcome::Unchanged,
                Err(e) => return Err(e.into()),
            }
        }
    };

    tracing::info!(email = %email, outcome = ?outcome, "Admin account ensured");
    Ok(outcome)
}
