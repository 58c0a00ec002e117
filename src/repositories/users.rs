use crate::models::{
    ledger::Currency,
    users::{NewUser, User, UserId},
};

use sqlx::PgConnection;

pub async fn lock_user(conn: &mut PgConnection, id: UserId) -> Result<Option<User>, anyhow::Error> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(conn)
        .await?;

    Ok(user)
}

pub async fn get_user_by_id(
    conn: &mut PgConnection,
    id: UserId,
) -> Result<Option<User>, anyhow::Error> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(conn)
        .await?;

    Ok(user)
}

pub async fn insert_user(
    conn: &mut PgConnection,
    user: &NewUser,
) -> Result<Option<User>, anyhow::Error> {
    let user = sqlx::query_as::<_, User>(
        r#"
            INSERT INTO users (id, username, referred_by, created_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO NOTHING
            RETURNING *
        "#,
    )
    .bind(user.id)
    .bind(&user.username)
    .bind(user.referred_by)
    .bind(user.created_at)
    .fetch_optional(conn)
    .await?;

    Ok(user)
}

pub async fn set_balance(
    conn: &mut PgConnection,
    id: UserId,
    currency: Currency,
    balance: i64,
) -> Result<(), anyhow::Error> {
    let query = match currency {
        Currency::Coin => "UPDATE users SET coin_balance = $1 WHERE id = $2",
        Currency::Cash => "UPDATE users SET cash_balance = $1 WHERE id = $2",
    };

    sqlx::query(query)
        .bind(balance)
        .bind(id)
        .execute(conn)
        .await?;

    Ok(())
}

pub async fn increment_referrals(conn: &mut PgConnection, id: UserId) -> Result<(), anyhow::Error> {
    sqlx::query("UPDATE users SET referrals = referrals + 1 WHERE id = $1")
        .bind(id)
        .execute(conn)
        .await?;

    Ok(())
}

pub async fn add_referral_earnings(
    conn: &mut PgConnection,
    id: UserId,
    amount: i64,
) -> Result<(), anyhow::Error> {
    sqlx::query("UPDATE users SET referral_earnings = referral_earnings + $1 WHERE id = $2")
        .bind(amount)
        .bind(id)
        .execute(conn)
        .await?;

    Ok(())
}

pub async fn referred_users(
    conn: &mut PgConnection,
    referrer: UserId,
) -> Result<Vec<User>, anyhow::Error> {
    let users = sqlx::query_as::<_, User>(
        "SELECT * FROM users WHERE referred_by = $1 ORDER BY created_at DESC",
    )
    .bind(referrer)
    .fetch_all(conn)
    .await?;

    Ok(users)
}

pub async fn is_admin(conn: &mut PgConnection, id: UserId) -> Result<bool, anyhow::Error> {
    let admin: bool =
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM admin_users WHERE user_id = $1)")
            .bind(id)
            .fetch_one(conn)
            .await?;

    Ok(admin)
}

pub async fn grant_admin(conn: &mut PgConnection, id: UserId) -> Result<(), anyhow::Error> {
    sqlx::query("INSERT INTO admin_users (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
        .bind(id)
        .execute(conn)
        .await?;

    Ok(())
}
