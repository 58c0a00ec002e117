use crate::models::{
    users::UserId,
    withdrawals::{NewWithdrawRequest, WithdrawRequest, WithdrawStatus},
};

use chrono::{DateTime, Utc};
use sqlx::PgConnection;
use uuid::Uuid;

pub async fn new_withdrawal(
    conn: &mut PgConnection,
    request: &NewWithdrawRequest,
) -> Result<WithdrawRequest, anyhow::Error> {
    let request_id = Uuid::new_v4().hyphenated().to_string();

    let withdrawal = sqlx::query_as::<_, WithdrawRequest>(
        r#"
            INSERT INTO withdraw_requests
            (id, user_id, amount, method, account_number, status, created_at)
            VALUES ($1, $2, $3, $4, $5, 'pending', $6)
            RETURNING *
        "#,
    )
    .bind(request_id)
    .bind(request.user_id)
    .bind(request.amount)
    .bind(&request.method)
    .bind(&request.account_number)
    .bind(request.created_at)
    .fetch_one(conn)
    .await?;

    Ok(withdrawal)
}

pub async fn lock_withdrawal(
    conn: &mut PgConnection,
    id: &str,
) -> Result<Option<WithdrawRequest>, anyhow::Error> {
    let withdrawal = sqlx::query_as::<_, WithdrawRequest>(
        "SELECT * FROM withdraw_requests WHERE id = $1 FOR UPDATE",
    )
    .bind(id)
    .fetch_optional(conn)
    .await?;

    Ok(withdrawal)
}

pub async fn update_withdrawal_status(
    conn: &mut PgConnection,
    id: &str,
    status: WithdrawStatus,
    decided_at: DateTime<Utc>,
) -> Result<(), anyhow::Error> {
    sqlx::query("UPDATE withdraw_requests SET status = $1, decided_at = $2 WHERE id = $3")
        .bind(status)
        .bind(decided_at)
        .bind(id)
        .execute(conn)
        .await?;

    Ok(())
}

pub async fn withdrawals_by_user(
    conn: &mut PgConnection,
    user_id: UserId,
) -> Result<Vec<WithdrawRequest>, anyhow::Error> {
    let withdrawals = sqlx::query_as::<_, WithdrawRequest>(
        "SELECT * FROM withdraw_requests WHERE user_id = $1 ORDER BY created_at DESC",
    )
    .bind(user_id)
    .fetch_all(conn)
    .await?;

    Ok(withdrawals)
}

pub async fn withdrawals_by_status(
    conn: &mut PgConnection,
    status: WithdrawStatus,
) -> Result<Vec<WithdrawRequest>, anyhow::Error> {
    let withdrawals = sqlx::query_as::<_, WithdrawRequest>(
        "SELECT * FROM withdraw_requests WHERE status = $1 ORDER BY created_at ASC",
    )
    .bind(status)
    .fetch_all(conn)
    .await?;

    Ok(withdrawals)
}
