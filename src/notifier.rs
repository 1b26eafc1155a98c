use skycast_weather::{Notification, Notifier, UserId};

/// Prints notifications to stdout and records them in the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, user_id: UserId, notification: &Notification) {
        tracing::info!("Notifying user {}: {:?}", user_id, notification);
        println!("[user {}] {}", user_id, notification.message());
    }
}
