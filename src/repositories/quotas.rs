use crate::models::{
    quotas::{QuotaAction, QuotaState},
    users::UserId,
};

use sqlx::PgConnection;

pub async fn get_quota(
    conn: &mut PgConnection,
    user_id: UserId,
    action: QuotaAction,
) -> Result<Option<QuotaState>, anyhow::Error> {
    let state = sqlx::query_as::<_, QuotaState>(
        "SELECT claims, window_date, last_claim_at FROM action_quotas WHERE user_id = $1 AND action = $2",
    )
    .bind(user_id)
    .bind(action)
    .fetch_optional(conn)
    .await?;

    Ok(state)
}

pub async fn upsert_quota(
    conn: &mut PgConnection,
    user_id: UserId,
    action: QuotaAction,
    state: &QuotaState,
) -> Result<(), anyhow::Error> {
    sqlx::query(
        r#"
            INSERT INTO action_quotas (user_id, action, claims, window_date, last_claim_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (user_id, action) DO UPDATE
            SET claims = EXCLUDED.claims,
                window_date = EXCLUDED.window_date,
                last_claim_at = EXCLUDED.last_claim_at
        "#,
    )
    .bind(user_id)
    .bind(action)
    .bind(state.claims)
    .bind(state.window_date)
    .bind(state.last_claim_at)
    .execute(conn)
    .await?;

    Ok(())
}
