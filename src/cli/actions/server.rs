use crate::{
    cli::{commands::admin::BootstrapAdmin, telemetry},
    notifications::{BrevoMailSender, LogMailSender, MailSender, NotificationRelay, RelayConfig},
    passport::{self, AppContext, AppState},
    store::{postgres, MemoryBackend, PgBackend},
    token::TokenService,
};
use anyhow::{Context, Result};
use secrecy::{ExposeSecret, SecretString};
use sqlx::postgres::PgPoolOptions;
use std::{path::PathBuf, sync::Arc, time::Duration};
use tracing::{error, info, warn};

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: Option<String>,
    pub public_url: String,
    pub private_key: PathBuf,
    pub public_key: PathBuf,
    pub relay_interval_seconds: u64,
    pub brevo: Option<(SecretString, String)>,
    pub admin: Option<BootstrapAdmin>,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the database is unreachable, bootstrap data cannot be written,
/// or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let context = AppContext::new(args.public_url.clone());
    let tokens = TokenService::new(&args.private_key, &args.public_key);

    // Key files must be readable before the first request.
    tokens
        .public_key()
        .context("Failed to load the token verification key")?;

    let state = match &args.dsn {
        Some(dsn) => {
            let pool = PgPoolOptions::new()
                .min_connections(1)
                .max_connections(5)
                .max_lifetime(Duration::from_secs(60 * 2))
                .test_before_acquire(true)
                .connect(dsn)
                .await
                .context("Failed to connect to database")?;
            postgres::migrate(&pool)
                .await
                .context("Failed to apply database schema")?;
            AppState::new(context, tokens, &PgBackend::new(pool))
        }
        None => {
            warn!("No --dsn given: using the in-memory store, all data is lost on exit");
            AppState::new(context, tokens, &MemoryBackend)
        }
    };
    let state = Arc::new(state);

    state
        .permissions
        .ensure_bootstrap_roles()
        .await
        .context("Failed to create bootstrap roles")?;

    if let Some(admin) = &args.admin {
        let identity = state
            .identities
            .ensure_admin_account(
                &admin.username,
                &admin.email,
                admin.password.expose_secret(),
            )
            .await
            .context("Failed to create bootstrap admin")?;
        info!(identity_id = %identity.id, "bootstrap admin ready");
    }

    let sender: Arc<dyn MailSender> = match args.brevo {
        Some((api_key, sender_email)) => {
            info!(sender = %sender_email, "delivering email through Brevo");
            Arc::new(BrevoMailSender::new(api_key, sender_email)?)
        }
        None => {
            info!("No mail provider configured: emails are only logged");
            Arc::new(LogMailSender)
        }
    };

    let relay = NotificationRelay::new(
        state.notifications.clone(),
        sender,
        RelayConfig::new().with_interval_seconds(args.relay_interval_seconds),
    )
    .spawn();

    let served = passport::serve(args.port, state, async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {err}");
        }
    })
    .await;

    relay.stop().await;
    telemetry::shutdown_tracer();

    served
}
