//! Recurring operation schedules of one VM
//!
//! The schedule list is part of the subscription configuration. It is never
//! patched locally: every successful create, update or delete reloads the
//! whole configuration, so the server stays the source of truth.

use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, instrument, warn};

use crate::cron_clock::CronClock;
use crate::errors::Result;
use crate::http::VmApi;
use crate::model::{Schedule, VmConfiguration};
use crate::notify::{Notification, Notifier};

#[derive(Clone)]
pub struct ScheduleStore {
    vm_id: String,
    api: VmApi,
    notifier: Notifier,
    configuration: Arc<RwLock<VmConfiguration>>,
}

impl ScheduleStore {
    pub fn new(vm_id: impl Into<String>, api: VmApi, notifier: Notifier) -> Self {
        Self {
            vm_id: vm_id.into(),
            api,
            notifier,
            configuration: Arc::new(RwLock::new(VmConfiguration::default())),
        }
    }

    pub fn vm_id(&self) -> &str {
        &self.vm_id
    }

    /// Schedules from the last configuration snapshot, in server order
    pub async fn list(&self) -> Vec<Schedule> {
        self.configuration.read().await.schedules.clone()
    }

    pub async fn find(&self, id: u32) -> Option<Schedule> {
        self.configuration
            .read()
            .await
            .schedules
            .iter()
            .find(|schedule| schedule.id == Some(id))
            .cloned()
    }

    pub async fn supports_snapshot(&self) -> bool {
        self.configuration.read().await.support_snapshot
    }

    /// Replace the configuration snapshot with the server's
    #[instrument(skip(self), fields(vm = %self.vm_id))]
    pub async fn reload(&self) -> Result<()> {
        let subscription = self.api.configuration(&self.vm_id).await?;
        let count = subscription.configuration.schedules.len();
        *self.configuration.write().await = subscription.configuration;
        info!("Loaded {} schedules for {}", count, self.vm_id);
        Ok(())
    }

    /// Create (no `id`) or update a schedule.
    ///
    /// The CRON is validated before any request: unparsable expressions fail
    /// with `CronError::Invalid`, once-per-second ones with
    /// `CronError::EverySecond`. The stored expression is the normalized one.
    #[instrument(skip(self), fields(vm = %self.vm_id))]
    pub async fn upsert(&self, schedule: Schedule) -> Result<Schedule> {
        let cron = CronClock::validate(&schedule.cron)?;
        let mut saved = Schedule { cron, ..schedule };

        let created = saved.id.is_none();
        let submitted = match saved.id {
            Some(id) => self.api.update_schedule(&self.vm_id, &saved).await.map(|_| id),
            None => self.api.create_schedule(&self.vm_id, &saved).await,
        };
        let id = match submitted {
            Ok(id) => id,
            Err(e) => {
                self.notify_failure("schedule-save", &e.to_string());
                return Err(e.into());
            }
        };
        saved.id = Some(id);

        info!(
            "Schedule {} {} for {}: {} '{}'",
            id,
            if created { "created" } else { "updated" },
            self.vm_id,
            saved.operation,
            saved.cron
        );
        self.notifier.notify(Notification::ScheduleSaved {
            vm_id: self.vm_id.clone(),
            schedule_id: id,
            operation: saved.operation,
            created,
        });
        self.reload_after_mutation().await;
        Ok(saved)
    }

    #[instrument(skip(self), fields(vm = %self.vm_id))]
    pub async fn remove(&self, id: u32) -> Result<()> {
        if let Err(e) = self.api.delete_schedule(&self.vm_id, id).await {
            self.notify_failure("schedule-delete", &e.to_string());
            return Err(e.into());
        }
        info!("Schedule {} deleted for {}", id, self.vm_id);
        self.notifier.notify(Notification::ScheduleDeleted {
            vm_id: self.vm_id.clone(),
            schedule_id: id,
        });
        self.reload_after_mutation().await;
        Ok(())
    }

    fn notify_failure(&self, operation: &str, reason: &str) {
        warn!("{} rejected for {}: {}", operation, self.vm_id, reason);
        self.notifier.notify(Notification::OperationFailed {
            vm_id: self.vm_id.clone(),
            operation: operation.to_string(),
            reason: reason.to_string(),
        });
    }

    async fn reload_after_mutation(&self) {
        if let Err(e) = self.reload().await {
            warn!("Schedules of {} may be stale, reload failed: {}", self.vm_id, e);
        }
    }
}
