//! Records broker session transitions in `system_logs`.

use crate::broker::BrokerLink;
use crate::persistence::{LogLevel, SystemLogWriter};

const SOURCE: &str = "mqtt";

/// Writes one row per change of the broker `connected` flag until the
/// subscriber goes away. Failed writes are logged and skipped.
pub async fn record_broker_transitions(writer: SystemLogWriter, link: BrokerLink) {
    let mut connected = link.watch_connected();
    while connected.changed().await.is_ok() {
        let up = *connected.borrow_and_update();
        let (level, message) = if up {
            (LogLevel::Info, format!("connected to broker {}", link.broker()))
        } else {
            (LogLevel::Warning, format!("disconnected from broker {}", link.broker()))
        };
        if let Err(e) = writer.write(level, &message, SOURCE).await {
            tracing::warn!(error = %e, %message, "failed to store system log");
        }
    }
    tracing::debug!("broker transition log stopped");
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::config::DatabaseConfig;
    use crate::persistence::postgres::connect_pool_lazy;

    #[tokio::test]
    async fn stops_when_link_closes_and_releases_connections() {
        let config = DatabaseConfig {
            url: "postgres://u:p@127.0.0.1:1/db".to_string(),
            min_connections: 0,
            max_connections: 1,
            run_migrations: false,
        };
        let Ok(pool) = connect_pool_lazy(&config) else {
            panic!("lazy pool build failed");
        };
        let (tx, link) = BrokerLink::detached("127.0.0.1:1883", "t");
        let task = tokio::spawn(record_broker_transitions(
            SystemLogWriter::new(pool.clone()),
            link,
        ));

        tx.send_replace(true);
        tx.send_replace(false);
        drop(tx);

        let Ok(joined) = tokio::time::timeout(Duration::from_secs(5), task).await else {
            panic!("recorder did not stop after the link closed");
        };
        assert!(joined.is_ok());
        assert_eq!(pool.status().outstanding, 0);
    }
}
