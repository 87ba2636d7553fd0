//! Telegram notifier.
//!
//! Sends subscriber notifications as private bot messages and operator
//! alerts to every configured admin chat.

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::ChatId;

use crate::domain::foundation::{Timestamp, UserId};
use crate::domain::subscription::{
    AlertKind, NotificationContext, NotificationKind, OperatorAlert,
};
use crate::ports::{Notifier, NotifyError};

const DATE_FORMAT: &str = "%d.%m.%Y %H:%M";

/// Notifier backed by the Telegram Bot API.
pub struct TelegramNotifier {
    bot: Bot,
    admin_ids: Vec<i64>,
}

impl TelegramNotifier {
    pub fn new(bot: Bot, admin_ids: Vec<i64>) -> Self {
        Self { bot, admin_ids }
    }

    async fn send(&self, chat_id: i64, text: String) -> Result<(), teloxide::RequestError> {
        self.bot.send_message(ChatId(chat_id), text).await?;
        Ok(())
    }
}

fn format_end(end: Option<Timestamp>) -> String {
    end.map(|t| t.as_datetime().format(DATE_FORMAT).to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// Renders the subscriber-facing text for a notification.
pub fn render_message(kind: NotificationKind, context: &NotificationContext) -> String {
    let end = format_end(context.entitlement_end);
    match kind {
        NotificationKind::Welcome => match context.entitlement_end {
            Some(_) => format!(
                "Welcome! Your trial access is active until {}. Use /pay to subscribe.",
                end
            ),
            None => "Welcome! Use /pay to subscribe to the channel.".to_string(),
        },
        NotificationKind::Activated => {
            let mut text = format!("Payment received. Your subscription is active until {}.", end);
            match &context.invite_link {
                Some(link) => {
                    text.push_str("\n\nJoin the channel: ");
                    text.push_str(link);
                    text.push_str("\nThe link works once and expires in 24 hours.");
                }
                None => {
                    text.push_str("\n\nContact an administrator to get access to the channel.")
                }
            }
            text
        }
        NotificationKind::Extended => format!(
            "Your subscription was extended until {}.{}",
            end,
            reason_suffix(context)
        ),
        NotificationKind::Expired => {
            "Your subscription has expired and channel access was removed. Use /pay to renew."
                .to_string()
        }
        NotificationKind::Cancelled => format!(
            "Your subscription was cancelled and channel access was suspended.{}",
            reason_suffix(context)
        ),
        NotificationKind::PaymentFailed => format!(
            "The payment did not go through. You can try again with /pay.{}",
            reason_suffix(context)
        ),
        NotificationKind::Reminder => {
            let days = context.days_left.unwrap_or(0);
            let unit = if days == 1 { "day" } else { "days" };
            format!(
                "Your subscription ends in {} {} ({}). Renew with /pay to keep access.",
                days, unit, end
            )
        }
    }
}

fn reason_suffix(context: &NotificationContext) -> String {
    context
        .reason
        .as_ref()
        .map(|r| format!("\nReason: {}", r))
        .unwrap_or_default()
}

/// Renders the text sent to operators.
pub fn render_alert(alert: &OperatorAlert) -> String {
    let label = match alert.kind {
        AlertKind::AmountMismatch => "AMOUNT MISMATCH",
        AlertKind::StoreWriteExhausted => "STORE WRITE FAILED",
        AlertKind::AccessRevocationFailed => "REVOCATION FAILED",
        AlertKind::SweepSummary => "Expiry sweep",
        AlertKind::Statistics => "Statistics",
    };
    let mut text = format!("[{}] {}", label, alert.message);
    if let Some(user_id) = alert.user_id {
        text.push_str(&format!("\nuser: {}", user_id));
    }
    if let Some(payment_id) = alert.payment_id {
        text.push_str(&format!("\npayment: {}", payment_id));
    }
    text
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify(
        &self,
        user_id: &UserId,
        kind: NotificationKind,
        context: &NotificationContext,
    ) -> Result<(), NotifyError> {
        self.send(user_id.as_i64(), render_message(kind, context))
            .await
            .map_err(|e| match e {
                teloxide::RequestError::Api(_) => NotifyError::Unreachable(*user_id),
                other => NotifyError::Delivery(other.to_string()),
            })
    }

    async fn alert_operators(&self, alert: &OperatorAlert) -> Result<(), NotifyError> {
        let text = render_alert(alert);
        let mut failures = Vec::new();

        for admin_id in &self.admin_ids {
            if let Err(e) = self.send(*admin_id, text.clone()).await {
                tracing::warn!(admin_id, error = %e, "Failed to alert operator");
                failures.push(admin_id.to_string());
            }
        }

        if !self.admin_ids.is_empty() && failures.len() == self.admin_ids.len() {
            return Err(NotifyError::Delivery(format!(
                "no operator reachable ({})",
                failures.join(", ")
            )));
        }
        Ok(())
    }
}
