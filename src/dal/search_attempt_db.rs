use sqlx::{postgres::PgQueryResult, PgPool};
use uuid::Uuid;

use crate::domain::search_attempt::{AttemptStatus, SearchAttempt};

pub async fn insert_attempt(pool: &PgPool, attempt: &SearchAttempt) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        insert into search_attempt
            (id, query_text, provider, status, created_by, created_at)
        values
            ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(attempt.id)
    .bind(&attempt.query_text)
    .bind(attempt.provider)
    .bind(attempt.status)
    .bind(&attempt.created_by)
    .bind(attempt.created_at)
    .execute(pool)
    .await?;

    Ok(())
}

// Status only ever moves forward; terminal rows are never touched again
// by the callers.
pub async fn update_status(
    pool: &PgPool,
    attempt_id: Uuid,
    status: AttemptStatus,
) -> Result<PgQueryResult, sqlx::Error> {
    sqlx::query(
        r#"
        update search_attempt set
            status = $2
        where
            id = $1
        "#,
    )
    .bind(attempt_id)
    .bind(status)
    .execute(pool)
    .await
}

pub async fn get_attempt(
    pool: &PgPool,
    attempt_id: Uuid,
) -> Result<Option<SearchAttempt>, sqlx::Error> {
    sqlx::query_as::<_, SearchAttempt>(
        r#"
        select
            id, query_text, provider, status, created_by, created_at
        from
            search_attempt
        where
            id = $1
        "#,
    )
    .bind(attempt_id)
    .fetch_optional(pool)
    .await
}

pub async fn recent_attempts(pool: &PgPool, limit: i64) -> Result<Vec<SearchAttempt>, sqlx::Error> {
    sqlx::query_as::<_, SearchAttempt>(
        r#"
        select
            id, query_text, provider, status, created_by, created_at
        from
            search_attempt
        order by created_at desc
        limit $1
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await
}
