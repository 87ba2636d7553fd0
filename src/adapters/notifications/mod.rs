//! Notification sinks that do not talk to a messaging platform.

mod recording_notifier;

pub use recording_notifier::{RecordingNotifier, SentNotification};
