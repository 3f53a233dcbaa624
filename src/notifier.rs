//! Side channel invoked once per match.
//!
//! Notification is fire-and-forget: implementations return nothing and must
//! not panic, so a failing backend never stops ingestion.

use serde_json::json;
use std::sync::{Arc, Mutex};

use crate::config::NotifierKind;
use crate::logging::LogContext;
use crate::models::{Direction, Transaction};

pub trait Notifier: Send + Sync {
    fn notify(&self, direction: Direction, transaction: &Transaction);
}

impl<N: Notifier + ?Sized> Notifier for Arc<N> {
    fn notify(&self, direction: Direction, transaction: &Transaction) {
        (**self).notify(direction, transaction)
    }
}

/// Emits one structured log entry per match.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, direction: Direction, transaction: &Transaction) {
        LogContext::new("notifier", "push_notification")
            .with_metadata("direction", json!(direction.as_str()))
            .with_transaction_hash(&transaction.hash)
            .with_metadata("from", json!(transaction.from))
            .with_metadata("to", json!(transaction.to))
            .with_metadata("value", json!(transaction.value))
            .info(&format!("{} transaction {}", direction, transaction.hash));
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn notify(&self, _direction: Direction, _transaction: &Transaction) {}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub direction: Direction,
    pub transaction: Transaction,
}

/// Keeps every notification in memory, in emission order.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    notifications: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        match self.notifications.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, direction: Direction, transaction: &Transaction) {
        let notification = Notification {
            direction,
            transaction: transaction.clone(),
        };
        match self.notifications.lock() {
            Ok(mut guard) => guard.push(notification),
            Err(poisoned) => poisoned.into_inner().push(notification),
        }
    }
}

/// Notifier chosen from configuration at startup.
#[derive(Debug, Clone, Copy)]
pub enum NotifierBackend {
    Log(LogNotifier),
    Noop(NoopNotifier),
}

impl From<NotifierKind> for NotifierBackend {
    fn from(kind: NotifierKind) -> Self {
        match kind {
            NotifierKind::Log => NotifierBackend::Log(LogNotifier),
            NotifierKind::None => NotifierBackend::Noop(NoopNotifier),
        }
    }
}

impl Notifier for NotifierBackend {
    fn notify(&self, direction: Direction, transaction: &Transaction) {
        match self {
            NotifierBackend::Log(n) => n.notify(direction, transaction),
            NotifierBackend::Noop(n) => n.notify(direction, transaction),
        }
    }
}
