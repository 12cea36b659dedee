//! Transient UI notifications with time-to-live

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::Display;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::debug;
use uuid::Uuid;

pub const DEFAULT_ALERT_TTL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertLevel {
    Exito,
    Error,
    Info,
}

#[derive(Debug, Clone, Serialize)]
pub struct Alert {
    pub id: Uuid,
    pub level: AlertLevel,
    pub mensaje: String,
    pub created_at: DateTime<Utc>,
}

/// Shared list of active alerts.
///
/// Each pushed alert is removed automatically after the TTL when a tokio
/// runtime is available; otherwise it stays until [`Alerts::dismiss`].
#[derive(Clone)]
pub struct Alerts {
    active: Arc<Mutex<Vec<Alert>>>,
    ttl: Duration,
}

impl Default for Alerts {
    fn default() -> Self {
        Self::new(DEFAULT_ALERT_TTL)
    }
}

impl Alerts {
    pub fn new(ttl: Duration) -> Self {
        Self {
            active: Arc::new(Mutex::new(Vec::new())),
            ttl,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Alert>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn push(&self, level: AlertLevel, mensaje: impl Into<String>) -> Uuid {
        let alert = Alert {
            id: Uuid::new_v4(),
            level,
            mensaje: mensaje.into(),
            created_at: Utc::now(),
        };
        let id = alert.id;
        self.lock().push(alert);

        match Handle::try_current() {
            Ok(handle) => {
                let alerts = self.clone();
                handle.spawn(async move {
                    tokio::time::sleep(alerts.ttl).await;
                    alerts.dismiss(id);
                });
            }
            Err(_) => debug!(%id, "No runtime, alert kept until dismissed"),
        }
        id
    }

    pub fn exito(&self, mensaje: impl Into<String>) -> Uuid {
        self.push(AlertLevel::Exito, mensaje)
    }

    /// Push a failed service call as an error alert
    pub fn error(&self, err: impl Display) -> Uuid {
        self.push(AlertLevel::Error, err.to_string())
    }

    pub fn dismiss(&self, id: Uuid) -> bool {
        let mut active = self.lock();
        let before = active.len();
        active.retain(|a| a.id != id);
        active.len() != before
    }

    /// Current alerts, oldest first
    pub fn active(&self) -> Vec<Alert> {
        self.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_alert_expires_after_ttl() {
        let alerts = Alerts::new(Duration::from_millis(30));
        alerts.exito("Cliente guardado");
        alerts.error("Error al guardar");
        assert_eq!(alerts.active().len(), 2);
        assert_eq!(alerts.active()[1].level, AlertLevel::Error);

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(alerts.active().is_empty());
    }

    #[tokio::test]
    async fn test_manual_dismiss() {
        let alerts = Alerts::new(Duration::from_secs(60));
        let id = alerts.push(AlertLevel::Info, "Base diaria pendiente");
        assert!(alerts.dismiss(id));
        assert!(!alerts.dismiss(id));
        assert!(alerts.active().is_empty());
    }

    #[test]
    fn test_without_runtime_alert_stays() {
        let alerts = Alerts::default();
        alerts.exito("ok");
        assert_eq!(alerts.active().len(), 1);
        assert_eq!(alerts.active()[0].mensaje, "ok");
    }
}
