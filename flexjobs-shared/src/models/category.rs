/// Job categories
///
/// The ten categories are seeded by migration and never change at runtime.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CategoryWithCount {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub job_count: i64,
}

impl Category {
    pub async fn list(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Category>("SELECT * FROM categories ORDER BY name")
            .fetch_all(pool)
            .await
    }

    /// All categories with their number of active jobs, by name
    pub async fn list_with_job_counts(pool: &PgPool) -> Result<Vec<CategoryWithCount>, sqlx::Error> {
        sqlx::query_as::<_, CategoryWithCount>(
            r#"
            SELECT c.id, c.name, c.description, c.icon,
                   COUNT(j.id) AS job_count
            FROM categories c
            LEFT JOIN jobs j ON j.category_id = c.id AND j.is_active = TRUE
            GROUP BY c.id, c.name, c.description, c.icon
            ORDER BY c.name
            "#,
        )
        .fetch_all(pool)
        .await
    }
}
