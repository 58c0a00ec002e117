use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use crate::{
    ledger::{quota::QuotaPolicies, rate_limit::TapRateLimiter, EconomyError},
    repositories::Store,
    settings::Settings,
};

pub mod admin;
pub mod http;
pub mod rewards;
pub mod users;
pub mod wallet;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Economy(#[from] EconomyError),
    #[error("Communication error: {0} - {1}")]
    Communication(String, String),
}

#[async_trait]
pub trait RequestHandler<T>: Send + Sync + 'static
where
    T: Send + 'static,
{
    async fn handle_request(&self, request: T);
}

#[async_trait]
pub trait Service<T, H>: Send + Sync + 'static
where
    T: Send + 'static,
    H: RequestHandler<T> + Clone + Send,
{
    async fn run(&mut self, handler: H, receiver: &mut mpsc::Receiver<T>) {
        while let Some(request) = receiver.recv().await {
            let handler = handler.clone();

            tokio::spawn(async move {
                handler.handle_request(request).await;
            });
        }
    }
}

/// Sends a request built around a fresh response channel and waits for the
/// service's answer.
pub async fn call<R, T>(
    channel: &mpsc::Sender<R>,
    service: &str,
    build: impl FnOnce(oneshot::Sender<Result<T, ServiceError>>) -> R,
) -> Result<T, ServiceError>
where
    R: Send + 'static,
{
    let (response_tx, response_rx) = oneshot::channel();

    channel
        .send(build(response_tx))
        .await
        .map_err(|e| ServiceError::Communication(service.to_string(), e.to_string()))?;

    response_rx
        .await
        .map_err(|e| ServiceError::Communication(service.to_string(), e.to_string()))?
}

async fn grant_admins(store: &dyn Store, admins: &[i64]) -> Result<(), anyhow::Error> {
    if admins.is_empty() {
        return Ok(());
    }

    let mut uow = store.begin().await?;
    for admin in admins {
        uow.grant_admin(*admin).await?;
    }
    uow.commit().await?;

    log::info!("Granted admin rights to {} configured users", admins.len());
    Ok(())
}

pub async fn start_services(
    store: Arc<dyn Store>,
    settings: &Settings,
) -> Result<http::AppState, anyhow::Error> {
    grant_admins(store.as_ref(), &settings.identity.admins).await?;

    let (user_tx, mut user_rx) = mpsc::channel(512);
    let (reward_tx, mut reward_rx) = mpsc::channel(512);
    let (wallet_tx, mut wallet_rx) = mpsc::channel(512);
    let (admin_tx, mut admin_rx) = mpsc::channel(512);

    let mut user_service = users::UserService::new();
    let mut reward_service = rewards::RewardService::new();
    let mut wallet_service = wallet::WalletService::new();
    let mut admin_service = admin::AdminService::new();

    log::info!("Starting user service.");
    let user_store = Arc::clone(&store);
    tokio::spawn(async move {
        user_service
            .run(users::UserRequestHandler::new(user_store), &mut user_rx)
            .await;
    });

    log::info!("Starting reward service.");
    let limiter = TapRateLimiter::from_settings(&settings.tap_throttle);
    limiter.start_eviction_task(Duration::from_secs(
        settings.tap_throttle.eviction_interval_secs.max(1),
    ));
    let reward_store = Arc::clone(&store);
    let policies = QuotaPolicies::from_settings(&settings.quotas);
    tokio::spawn(async move {
        let handler = rewards::RewardRequestHandler::new(reward_store, policies, limiter);
        reward_service.run(handler, &mut reward_rx).await;
    });

    log::info!("Starting wallet service.");
    let wallet_store = Arc::clone(&store);
    tokio::spawn(async move {
        wallet_service
            .run(wallet::WalletRequestHandler::new(wallet_store), &mut wallet_rx)
            .await;
    });

    log::info!("Starting admin service.");
    let admin_store = Arc::clone(&store);
    tokio::spawn(async move {
        admin_service
            .run(admin::AdminRequestHandler::new(admin_store), &mut admin_rx)
            .await;
    });

    log::info!("Started services.");
    Ok(http::AppState::new(
        user_tx,
        reward_tx,
        wallet_tx,
        admin_tx,
        &settings.identity.header,
    ))
}
