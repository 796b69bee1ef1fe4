use std::collections::HashSet;

use sqlx::PgPool;

use crate::domain::lead::{Lead, LeadSource};

pub const PAGE_SIZE: i64 = 20;

const LEAD_COLUMNS: &str = "id, name, city, address, website, instagram_handle, \
     tiktok_handle, source, external_id, notes, created_at";

/// Inserts one confirmed lead. Returns false when the natural key already
/// exists: the unique index makes the check-then-insert one indivisible
/// step, so a concurrent search cannot slip a duplicate in between.
pub async fn insert_lead(pool: &PgPool, lead: &Lead) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        insert into lead
            (id, name, city, address, website, instagram_handle, tiktok_handle,
             source, external_id, natural_key, notes, created_at)
        values
            ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        on conflict (source, natural_key) do nothing
        "#,
    )
    .bind(lead.id)
    .bind(&lead.name)
    .bind(&lead.city)
    .bind(&lead.address)
    .bind(&lead.website)
    .bind(&lead.instagram_handle)
    .bind(&lead.tiktok_handle)
    .bind(lead.source)
    .bind(&lead.external_id)
    .bind(lead.natural_key())
    .bind(&lead.notes)
    .bind(lead.created_at)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// One read of the persisted keys for a source; the Deduplicator works
/// against this snapshot.
pub async fn get_natural_keys(
    pool: &PgPool,
    source: LeadSource,
) -> Result<HashSet<String>, sqlx::Error> {
    let keys: Vec<String> =
        sqlx::query_scalar(r#"select natural_key from lead where source = $1"#)
            .bind(source)
            .fetch_all(pool)
            .await?;

    Ok(keys.into_iter().collect())
}

#[derive(Debug, Clone, Default)]
pub struct LeadFilter {
    pub source: Option<LeadSource>,
    pub city: Option<String>,
}

pub async fn get_leads(
    pool: &PgPool,
    filter: &LeadFilter,
    page: i64,
) -> Result<Vec<Lead>, sqlx::Error> {
    let offset = (page.max(1) - 1) * PAGE_SIZE;

    sqlx::query_as::<_, Lead>(&format!(
        r#"
        select
            {LEAD_COLUMNS}
        from
            lead
        where
            ($1::"LeadSource" is null or source = $1) and
            ($2::text is null or lower(city) like '%' || lower($2) || '%')
        order by created_at desc
        limit $3 offset $4
        "#
    ))
    .bind(filter.source)
    .bind(&filter.city)
    .bind(PAGE_SIZE)
    .bind(offset)
    .fetch_all(pool)
    .await
}

// Unpaginated variant for the manual spreadsheet export.
pub async fn get_all_leads(pool: &PgPool, filter: &LeadFilter) -> Result<Vec<Lead>, sqlx::Error> {
    sqlx::query_as::<_, Lead>(&format!(
        r#"
        select
            {LEAD_COLUMNS}
        from
            lead
        where
            ($1::"LeadSource" is null or source = $1) and
            ($2::text is null or lower(city) like '%' || lower($2) || '%')
        order by created_at desc
        "#
    ))
    .bind(filter.source)
    .bind(&filter.city)
    .fetch_all(pool)
    .await
}

pub async fn count_leads(pool: &PgPool, filter: &LeadFilter) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(
        r#"
        select
            count(*)
        from
            lead
        where
            ($1::"LeadSource" is null or source = $1) and
            ($2::text is null or lower(city) like '%' || lower($2) || '%')
        "#,
    )
    .bind(filter.source)
    .bind(&filter.city)
    .fetch_one(pool)
    .await
}

#[derive(Debug, sqlx::FromRow)]
pub struct SourceCount {
    pub source: LeadSource,
    pub count: i64,
}

pub async fn count_by_source(pool: &PgPool) -> Result<Vec<SourceCount>, sqlx::Error> {
    sqlx::query_as::<_, SourceCount>(
        r#"
        select
            source,
            count(*) as count
        from
            lead
        group by source
        order by count desc
        "#,
    )
    .fetch_all(pool)
    .await
}

pub async fn latest_leads(pool: &PgPool, limit: i64) -> Result<Vec<Lead>, sqlx::Error> {
    sqlx::query_as::<_, Lead>(&format!(
        r#"
        select
            {LEAD_COLUMNS}
        from
            lead
        order by created_at desc
        limit $1
        "#
    ))
    .bind(limit)
    .fetch_all(pool)
    .await
}
