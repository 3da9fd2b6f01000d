//! Delivery counters.

use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::registry::DeliveryReport;

#[derive(Debug, Default)]
pub(crate) struct StatsCounters {
    connections_opened: AtomicU64,
    reconnect_attempts: AtomicU64,
    events_received: AtomicU64,
    events_delivered: AtomicU64,
    listener_failures: AtomicU64,
}

impl StatsCounters {
    pub(crate) fn record_open(&self) {
        self.connections_opened.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_retry(&self) {
        self.reconnect_attempts.fetch_add(1, Ordering::Relaxed);
    }

    /// Count an inbound event and return its sequence number
    pub(crate) fn record_received(&self) -> u64 {
        self.events_received.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub(crate) fn record_delivery(&self, report: &DeliveryReport) {
        self.events_delivered
            .fetch_add(report.delivered, Ordering::Relaxed);
        self.listener_failures
            .fetch_add(report.failed, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, listeners: usize) -> BrokerStats {
        BrokerStats {
            connections_opened: self.connections_opened.load(Ordering::Relaxed),
            reconnect_attempts: self.reconnect_attempts.load(Ordering::Relaxed),
            events_received: self.events_received.load(Ordering::Relaxed),
            events_delivered: self.events_delivered.load(Ordering::Relaxed),
            listener_failures: self.listener_failures.load(Ordering::Relaxed),
            listeners,
        }
    }
}

/// Statistics about the broker since it was created
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BrokerStats {
    /// Successful handshakes
    pub connections_opened: u64,
    /// Retries scheduled after a failed handshake or a lost connection
    pub reconnect_attempts: u64,
    /// Events read from the push channel
    pub events_received: u64,
    /// Listener invocations that returned `Ok`
    pub events_delivered: u64,
    /// Listener invocations that returned an error or panicked
    pub listener_failures: u64,
    /// Listeners currently registered
    pub listeners: usize,
}

impl fmt::Display for BrokerStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Notification Broker Stats:")?;
        writeln!(f, "  Listeners: {}", self.listeners)?;
        writeln!(f, "  Connections opened: {}", self.connections_opened)?;
        writeln!(f, "  Reconnect attempts: {}", self.reconnect_attempts)?;
        writeln!(f, "  Events received: {}", self.events_received)?;
        writeln!(f, "  Events delivered: {}", self.events_delivered)?;
        writeln!(f, "  Listener failures: {}", self.listener_failures)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let counters = StatsCounters::default();
        counters.record_open();
        counters.record_retry();
        counters.record_retry();
        assert_eq!(counters.record_received(), 1);
        assert_eq!(counters.record_received(), 2);
        counters.record_delivery(&DeliveryReport {
            delivered: 3,
            failed: 1,
            interrupted: false,
        });

        let stats = counters.snapshot(4);
        assert_eq!(
            stats,
            BrokerStats {
                connections_opened: 1,
                reconnect_attempts: 2,
                events_received: 2,
                events_delivered: 3,
                listener_failures: 1,
                listeners: 4,
            }
        );
    }

    #[test]
    fn test_display_and_serialize() {
        let stats = BrokerStats {
            events_received: 5,
            ..Default::default()
        };
        let rendered = stats.to_string();
        assert!(rendered.starts_with("Notification Broker Stats:"));
        assert!(rendered.contains("Events received: 5"));

        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["events_received"], 5);
    }
}
