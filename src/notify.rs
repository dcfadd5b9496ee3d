use tokio::sync::mpsc;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Success,
    Error,
}

/// Short user-visible message, the terminal equivalent of a toast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
}

/// Fan-in point for notifications from every view and action.
///
/// Every notification is logged; when built with [`Notifier::channel`] it is
/// also delivered to the receiver so a front end can display it.
#[derive(Debug, Clone, Default)]
pub struct Notifier {
    tx: Option<mpsc::UnboundedSender<Notification>>,
}

impl Notifier {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// Log-only notifier.
    pub fn silent() -> Self {
        Self { tx: None }
    }

    pub fn info(&self, message: impl Into<String>) {
        self.emit(NotificationLevel::Info, message.into());
    }

    pub fn success(&self, message: impl Into<String>) {
        self.emit(NotificationLevel::Success, message.into());
    }

    pub fn error(&self, message: impl Into<String>) {
        self.emit(NotificationLevel::Error, message.into());
    }

    fn emit(&self, level: NotificationLevel, message: String) {
        match level {
            NotificationLevel::Error => warn!(notification = %message, "error notification"),
            _ => info!(notification = %message, "notification"),
        }
        if let Some(tx) = &self.tx {
            // receiver gone means nobody is displaying notifications anymore
            let _ = tx.send(Notification { level, message });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_delivers_in_order() {
        let (notifier, mut rx) = Notifier::channel();
        notifier.error("Failed to fetch pods data");
        notifier.success("Analytics data exported");

        assert_eq!(
            rx.try_recv().unwrap(),
            Notification {
                level: NotificationLevel::Error,
                message: "Failed to fetch pods data".to_string(),
            }
        );
        assert_eq!(rx.try_recv().unwrap().level, NotificationLevel::Success);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_dropped_receiver_is_harmless() {
        let (notifier, rx) = Notifier::channel();
        drop(rx);
        notifier.info("still fine");
        Notifier::silent().error("logged only");
    }
}
