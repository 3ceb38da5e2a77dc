//! Threshold alert evaluation.
//!
//! Conditions are checked independently, so one reading can raise several
//! alerts at once. A non-empty result is dispatched as a single batch keyed
//! by device id. Dispatch is at-least-once: a retried task re-evaluates and
//! re-sends, and downstream consumers must tolerate the duplicates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{QualityTier, SensorReading};

// ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    HighTemperature,
    LowTemperature,
    LowBattery,
    WeakSignal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl AlertType {
    pub fn severity(self) -> Severity {
        // ---
        match self {
            Self::HighTemperature | Self::LowTemperature => Severity::Medium,
            Self::LowBattery => Severity::High,
            Self::WeakSignal => Severity::Low,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Alert {
    // ---
    pub device_id: String,
    pub alert_type: AlertType,
    pub message: String,
    pub severity: Severity,
    pub timestamp: DateTime<Utc>,
}

impl Alert {
    fn new(device_id: &str, alert_type: AlertType, message: String) -> Self {
        // ---
        Self {
            device_id: device_id.to_string(),
            alert_type,
            message,
            severity: alert_type.severity(),
            timestamp: Utc::now(),
        }
    }
}

// ---

/// Derive the threshold alerts a reading triggers, possibly none.
pub fn evaluate(reading: &SensorReading) -> Vec<Alert> {
    // ---
    let mut alerts = Vec::new();
    let device_id = &reading.device_id;

    if let Some(t) = reading.temperature {
        if t > 35.0 {
            alerts.push(Alert::new(
                device_id,
                AlertType::HighTemperature,
                format!("Temperature too high: {t}°C"),
            ));
        } else if t < 5.0 {
            alerts.push(Alert::new(
                device_id,
                AlertType::LowTemperature,
                format!("Temperature too low: {t}°C"),
            ));
        }
    }

    if let Some(b) = reading.battery_level {
        if b < 15.0 {
            alerts.push(Alert::new(
                device_id,
                AlertType::LowBattery,
                format!("Battery level low: {b}%"),
            ));
        }
    }

    if let Some(s) = reading.signal_strength {
        if s < 20.0 {
            alerts.push(Alert::new(
                device_id,
                AlertType::WeakSignal,
                format!("Signal strength weak: {s}%"),
            ));
        }
    }

    alerts
}

/// Whether the reading warrants a push to external systems.
///
/// Evaluated independently of [`evaluate`]; the two can diverge (a weak
/// signal raises an alert but never an external notification). Missing
/// values fail the numeric comparisons and do not trigger.
pub fn should_notify_externally(reading: &SensorReading) -> bool {
    // ---
    reading.quality_tier == QualityTier::Poor
        || reading.battery_level.is_some_and(|b| b < 15.0)
        || reading.temperature.is_some_and(|t| t > 35.0 || t < 5.0)
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::models::RawReading;

    fn reading(raw: RawReading) -> SensorReading {
        SensorReading::from_raw("device-A", raw, Utc::now())
    }

    #[test]
    fn test_high_temperature_raises_single_medium_alert() {
        // ---
        let alerts = evaluate(&reading(RawReading {
            temperature: Some(36.0),
            ..RawReading::default()
        }));

        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].alert_type, AlertType::HighTemperature);
        assert_eq!(alerts[0].severity, Severity::Medium);
        assert_eq!(alerts[0].message, "Temperature too high: 36°C");
        assert_eq!(alerts[0].device_id, "device-A");
    }

    #[test]
    fn test_cold_reading_with_dead_battery_raises_two_alerts() {
        // ---
        let alerts = evaluate(&reading(RawReading {
            temperature: Some(4.0),
            battery_level: Some(10.0),
            ..RawReading::default()
        }));

        let kinds: Vec<_> = alerts.iter().map(|a| (a.alert_type, a.severity)).collect();
        assert_eq!(
            kinds,
            vec![
                (AlertType::LowTemperature, Severity::Medium),
                (AlertType::LowBattery, Severity::High),
            ]
        );
    }

    #[test]
    fn test_nominal_reading_raises_nothing() {
        // ---
        let alerts = evaluate(&reading(RawReading {
            temperature: Some(20.0),
            battery_level: Some(50.0),
            signal_strength: Some(50.0),
            ..RawReading::default()
        }));

        assert!(alerts.is_empty());
    }

    #[test]
    fn test_thresholds_are_exclusive() {
        // ---
        // 35, 5, 15 and 20 sit exactly on the thresholds and must not fire.
        let alerts = evaluate(&reading(RawReading {
            temperature: Some(35.0),
            battery_level: Some(15.0),
            signal_strength: Some(20.0),
            ..RawReading::default()
        }));
        assert!(alerts.is_empty());

        let low_edge = evaluate(&reading(RawReading {
            temperature: Some(5.0),
            ..RawReading::default()
        }));
        assert!(low_edge.is_empty());
    }

    #[test]
    fn test_weak_signal_alerts_without_external_notification() {
        // ---
        let r = reading(RawReading {
            temperature: Some(20.0),
            signal_strength: Some(10.0),
            ..RawReading::default()
        });

        let alerts = evaluate(&r);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].alert_type, AlertType::WeakSignal);
        assert!(!should_notify_externally(&r));
    }

    #[test]
    fn test_poor_quality_tier_notifies_externally() {
        // ---
        let mut r = reading(RawReading {
            temperature: Some(20.0),
            ..RawReading::default()
        });
        assert!(!should_notify_externally(&r));

        r.quality_tier = QualityTier::Poor;
        assert!(should_notify_externally(&r));
    }

    #[test]
    fn test_missing_values_do_not_notify() {
        // ---
        let r = reading(RawReading {
            pressure: Some(1013.0),
            ..RawReading::default()
        });
        assert!(!should_notify_externally(&r));
    }
}
