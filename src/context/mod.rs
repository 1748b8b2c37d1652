use std::sync::Arc;

use gateway_triple_store::TransactionalExecutor;

use crate::channel::{ReadMirror, UpdateScheduler};
use crate::config::Config;
use crate::services::notification::NotificationEmitter;

/// Shared application context handed to the HTTP controllers.
///
/// Dropping the last clone closes the update channel, which is how shutdown
/// reaches the worker pool.
pub struct Context {
    config: Arc<Config>,
    executor: Arc<TransactionalExecutor>,
    update_scheduler: UpdateScheduler,
    read_mirror: ReadMirror,
    notifier: Arc<dyn NotificationEmitter>,
}

impl Context {
    pub fn new(
        config: Arc<Config>,
        executor: Arc<TransactionalExecutor>,
        update_scheduler: UpdateScheduler,
        read_mirror: ReadMirror,
        notifier: Arc<dyn NotificationEmitter>,
    ) -> Self {
        Self {
            config,
            executor,
            update_scheduler,
            read_mirror,
            notifier,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn executor(&self) -> &Arc<TransactionalExecutor> {
        &self.executor
    }

    pub fn update_scheduler(&self) -> &UpdateScheduler {
        &self.update_scheduler
    }

    pub fn read_mirror(&self) -> &ReadMirror {
        &self.read_mirror
    }

    pub fn notifier(&self) -> &Arc<dyn NotificationEmitter> {
        &self.notifier
    }
}
