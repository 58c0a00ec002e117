use sqlx::PgConnection;

pub async fn get_value(conn: &mut PgConnection, key: &str) -> Result<Option<i64>, anyhow::Error> {
    let value: Option<i64> = sqlx::query_scalar("SELECT value FROM economy_config WHERE key = $1")
        .bind(key)
        .fetch_optional(conn)
        .await?;

    Ok(value)
}

pub async fn update_value(
    conn: &mut PgConnection,
    key: &str,
    value: i64,
) -> Result<bool, anyhow::Error> {
    let result = sqlx::query(
        "UPDATE economy_config SET value = $1, updated_at = CURRENT_TIMESTAMP WHERE key = $2",
    )
    .bind(value)
    .bind(key)
    .execute(conn)
    .await?;

    Ok(result.rows_affected() > 0)
}
