use crate::models::{
    ledger::{Currency, LedgerEntry, NewLedgerEntry},
    users::UserId,
};

use sqlx::PgConnection;

pub async fn append_entry(
    conn: &mut PgConnection,
    entry: &NewLedgerEntry,
) -> Result<(), anyhow::Error> {
    sqlx::query(
        r#"
            INSERT INTO ledger (user_id, currency, amount, action, source)
            VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(entry.user_id)
    .bind(entry.currency)
    .bind(entry.amount)
    .bind(entry.action)
    .bind(&entry.source)
    .execute(conn)
    .await?;

    Ok(())
}

pub async fn entries_for_user(
    conn: &mut PgConnection,
    user_id: UserId,
    limit: i64,
) -> Result<Vec<LedgerEntry>, anyhow::Error> {
    let entries = sqlx::query_as::<_, LedgerEntry>(
        "SELECT * FROM ledger WHERE user_id = $1 ORDER BY id DESC LIMIT $2",
    )
    .bind(user_id)
    .bind(limit)
    .fetch_all(conn)
    .await?;

    Ok(entries)
}

pub async fn sum_for_user(
    conn: &mut PgConnection,
    user_id: UserId,
    currency: Currency,
) -> Result<i64, anyhow::Error> {
    let sum: i64 = sqlx::query_scalar(
        "SELECT COALESCE(SUM(amount), 0)::BIGINT FROM ledger WHERE user_id = $1 AND currency = $2",
    )
    .bind(user_id)
    .bind(currency)
    .fetch_one(conn)
    .await?;

    Ok(sum)
}
