use crate::alerts::threshold::Alert;
use crate::error::AlertError;
use log::{info, warn};

/// Delivery channel for alert notifications
#[cfg_attr(test, mockall::automock)]
pub trait AlertTransport {
    /// Send one notification
    ///
    /// # Errors
    ///
    /// Returns an `AlertError` if the message cannot be built, sent, or is refused.
    fn deliver(&self, subject: &str, body: &str) -> Result<(), AlertError>;
}

/// Outcome of dispatching one alert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// No transport configured; the alert went to the diagnostic log only
    LogOnly,
    /// The transport accepted the notification
    Delivered,
    /// The transport failed; the failure was logged and swallowed
    Failed,
}

/// Formats and sends alert notifications
///
/// Every alert is logged as a warning. When a transport is configured the alert is
/// also sent through it, and transport failures are reported as warnings without
/// ever reaching the calling collector.
pub struct AlertDispatcher {
    /// Host name used in notification subjects
    host: String,
    transport: Option<Box<dyn AlertTransport>>,
}

impl AlertDispatcher {
    /// Create a dispatcher that only logs alerts
    pub fn log_only(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            transport: None,
        }
    }

    /// Create a dispatcher that logs alerts and sends them through `transport`
    pub fn with_transport(host: impl Into<String>, transport: Box<dyn AlertTransport>) -> Self {
        Self {
            host: host.into(),
            transport: Some(transport),
        }
    }

    pub fn has_transport(&self) -> bool {
        self.transport.is_some()
    }

    /// Dispatch an alert, reporting but never propagating delivery failures
    pub fn dispatch(&self, alert: &Alert) -> Delivery {
        let subject = alert.subject(&self.host);
        let body = alert.body();

        warn!(
            "ALERT: {} on {} at {:.2}% (threshold {})",
            alert.metric, alert.source, alert.value, alert.limit
        );

        let transport = match &self.transport {
            Some(transport) => transport,
            None => return Delivery::LogOnly,
        };

        match transport.deliver(&subject, &body) {
            Ok(()) => {
                info!("Sent alert notification: {}", subject);
                Delivery::Delivered
            }
            Err(e) => {
                warn!("Failed to send alert notification '{}': {}", subject, e);
                Delivery::Failed
            }
        }
    }
}

/// Host name of this machine, for alert subjects
pub fn local_hostname() -> String {
    sysinfo::System::host_name().unwrap_or_else(|| "localhost".to_string())
}
