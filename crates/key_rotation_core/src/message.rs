use chrono::{DateTime, Utc};

use crate::account::AccountId;
use crate::audit::elapsed_days;
use crate::config::ReminderConfig;
use crate::contract::{NotificationBatch, ReminderMessage, ROTATION_GUIDE_URL};

const LINE_END: &str = "\r\n";
const CREATE_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";

pub fn reminder_subject(account_id: &AccountId) -> String {
    format!("Remember to rotate your AWS Keys on {account_id}!")
}

pub fn render_reminder(
    batch: &NotificationBatch,
    account_id: &AccountId,
    config: &ReminderConfig,
    now: DateTime<Utc>,
) -> ReminderMessage {
    let greeting_name = batch
        .keys
        .first()
        .map(|key| key.user_name.as_str())
        .unwrap_or(batch.user_name.as_str());
    let alert_days = config.alert_after_days;

    let mut lines = vec![
        format!("Dear {greeting_name},"),
        String::new(),
        format!(
            "This is an automatic reminder to rotate your AWS Access Keys at least every {alert_days} days."
        ),
        String::new(),
        format!(
            "At the moment, you have {} key(s) on the account {account_id} that have been created more than {alert_days} days ago:",
            batch.keys.len()
        ),
    ];

    lines.extend(batch.keys.iter().map(|key| {
        format!(
            "- {} was created on {} ({} days ago)",
            key.access_key_id,
            key.create_date.format(CREATE_DATE_FORMAT),
            elapsed_days(key.create_date, now)
        )
    }));

    lines.extend([
        String::new(),
        format!(
            "To learn how to rotate your AWS Access Key, please read the official guide at {ROTATION_GUIDE_URL}"
        ),
        format!(
            "If you have any question, please don't hesitate to contact the Support Team at {}.",
            config.support_contact
        ),
        String::new(),
        format!(
            "This automatic reminder will be sent again in {} days, if the key(s) will not be rotated.",
            config.send_every_days
        ),
        String::new(),
        "Regards,".to_string(),
        "Your lovely Support Team".to_string(),
    ]);

    let mut body = lines.join(LINE_END);
    body.push_str(LINE_END);

    ReminderMessage {
        subject: reminder_subject(account_id),
        body,
    }
}
