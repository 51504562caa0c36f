use chrono::{DateTime, Utc};
use serde::Serialize;

/// Process-wide health facts, built once at startup and handed to the
/// HTTP layer through `AppState`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Health {
    pub started_at: DateTime<Utc>,
    pub service: String,
    pub hostname: String,
}

#[derive(Debug, Serialize)]
pub struct HealthReport {
    #[serde(flatten)]
    health: Health,
    uptime: String,
}

impl Health {
    pub fn new(service: impl Into<String>) -> Self {
        let hostname = std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_string());
        let suffix = rand::random::<u8>() % 100;
        Self {
            started_at: Utc::now(),
            service: service.into(),
            hostname: format!("{hostname}-{suffix}"),
        }
    }

    pub fn report(&self) -> HealthReport {
        let uptime = Utc::now() - self.started_at;
        HealthReport {
            health: self.clone(),
            uptime: format!("{}s", uptime.num_seconds()),
        }
    }
}
