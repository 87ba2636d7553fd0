//! Telegram adapters.
//!
//! - `TelegramChannel` - Invite links, bans and membership checks
//! - `TelegramNotifier` - Subscriber messages and operator alerts
//! - `StubChannelProvider` - In-memory channel for tests

mod stub_channel_provider;
mod telegram_channel;
mod telegram_notifier;

pub use stub_channel_provider::{ProviderCall, StubChannelProvider};
pub use telegram_channel::TelegramChannel;
pub use telegram_notifier::{render_alert, render_message, TelegramNotifier};
