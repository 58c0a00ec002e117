use crate::models::{
    referrals::{NewReferralLog, ReferralLog},
    users::UserId,
};

use sqlx::PgConnection;

pub async fn insert_log(conn: &mut PgConnection, log: &NewReferralLog) -> Result<(), anyhow::Error> {
    sqlx::query(
        "INSERT INTO referral_logs (referrer_id, from_user_id, amount, kind) VALUES ($1, $2, $3, $4)",
    )
    .bind(log.referrer_id)
    .bind(log.from_user_id)
    .bind(log.amount)
    .bind(log.kind)
    .execute(conn)
    .await?;

    Ok(())
}

pub async fn logs_for_referrer(
    conn: &mut PgConnection,
    referrer: UserId,
) -> Result<Vec<ReferralLog>, anyhow::Error> {
    let logs = sqlx::query_as::<_, ReferralLog>(
        "SELECT * FROM referral_logs WHERE referrer_id = $1 ORDER BY created_at DESC, id DESC",
    )
    .bind(referrer)
    .fetch_all(conn)
    .await?;

    Ok(logs)
}
