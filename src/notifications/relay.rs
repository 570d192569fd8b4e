//! Background delivery of queued email notifications.
//!
//! Publishers only insert notifications with `isSent = false`. The relay sweeps those
//! on a fixed interval, hands each one to a `MailSender`, and marks it sent once the
//! sender returns `Ok`. Anything that fails stays unsent and is picked up again on
//! the next sweep, so delivery is at-least-once: a crash between sending and marking
//! can produce a duplicate email, never a lost one.
//!
//! Failures are isolated per notification. A notification without a recipient or one
//! the provider rejects is logged and skipped; the rest of the sweep still runs.
//!
//! The task owns a stop signal; `RelayHandle::stop` ends the loop between sweeps and
//! waits for it to finish.
use super::mail::{MailMessage, MailSender};
use super::models::Notification;
use super::repo::NotificationRepository;
use anyhow::{anyhow, Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

#[derive(Clone, Copy, Debug)]
pub struct RelayConfig {
    interval: Duration,
}

impl RelayConfig {
    /// Default relay config: sweep every 5 seconds.
    #[must_use]
    pub fn new() -> Self {
        Self {
            interval: Duration::from_secs(5),
        }
    }

    #[must_use]
    pub fn with_interval_seconds(mut self, seconds: u64) -> Self {
        self.interval = Duration::from_secs(seconds);
        self
    }

    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// A zero interval would spin; clamp it to one second.
    #[must_use]
    pub fn normalize(mut self) -> Self {
        if self.interval.is_zero() {
            self.interval = Duration::from_secs(1);
        }
        self
    }

    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of a single sweep.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub attempted: usize,
    pub delivered: usize,
    pub failed: usize,
}

#[derive(Clone)]
pub struct NotificationRelay {
    notifications: NotificationRepository,
    sender: Arc<dyn MailSender>,
    config: RelayConfig,
}

impl NotificationRelay {
    #[must_use]
    pub fn new(
        notifications: NotificationRepository,
        sender: Arc<dyn MailSender>,
        config: RelayConfig,
    ) -> Self {
        Self {
            notifications,
            sender,
            config: config.normalize(),
        }
    }

    /// Deliver every pending email notification once.
    ///
    /// # Errors
    /// Returns an error only if the pending notifications cannot be listed; per-item
    /// failures are counted in the report.
    pub async fn sweep(&self) -> Result<SweepReport> {
        let pending = self
            .notifications
            .pending_email()
            .await
            .context("failed to load pending notifications")?;

        let mut report = SweepReport {
            attempted: pending.len(),
            ..SweepReport::default()
        };

        for mut notification in pending {
            match self.deliver(&mut notification).await {
                Ok(()) => report.delivered += 1,
                Err(err) => {
                    report.failed += 1;
                    warn!(
                        notification_id = %notification.id,
                        identity_id = %notification.identity_id,
                        "notification delivery failed: {err:#}"
                    );
                }
            }
        }

        Ok(report)
    }

    async fn deliver(&self, notification: &mut Notification) -> Result<()> {
        let to_email = notification
            .recipient()
            .ok_or_else(|| anyhow!("notification has no email parameter"))?
            .to_string();

        let message = MailMessage {
            to_email,
            subject: notification.header.clone(),
            body: notification.body.clone(),
        };
        self.sender.send(&message).await?;

        notification.mark_sent();
        let updated = self
            .notifications
            .save_delivery(notification)
            .await
            .context("failed to mark notification as sent")?;
        if !updated {
            // Deleted out from under us after the send; nothing left to mark.
            debug!(notification_id = %notification.id, "sent notification no longer exists");
        }
        Ok(())
    }

    /// Start the relay loop on the current tokio runtime.
    #[must_use]
    pub fn spawn(self) -> RelayHandle {
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let interval = self.config.interval();

        let task = tokio::spawn(async move {
            info!(interval_secs = interval.as_secs_f64(), "notification relay started");
            loop {
                match self.sweep().await {
                    Ok(report) if report.attempted > 0 => info!(
                        attempted = report.attempted,
                        delivered = report.delivered,
                        failed = report.failed,
                        "notification sweep finished"
                    ),
                    Ok(_) => {}
                    Err(err) => error!("notification sweep failed: {err:#}"),
                }

                tokio::select! {
                    () = tokio::time::sleep(interval) => {}
                    changed = stop_rx.changed() => {
                        if changed.is_err() || *stop_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            info!("notification relay stopped");
        });

        RelayHandle {
            stop: stop_tx,
            task,
        }
    }
}

/// Owns the running relay task.
#[derive(Debug)]
pub struct RelayHandle {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl RelayHandle {
    /// Signal the relay to stop and wait for the current sweep to finish.
    pub async fn stop(self) {
        let _ = self.stop.send(true);
        if let Err(err) = self.task.await {
            error!("notification relay task failed: {err}");
        }
    }
}
