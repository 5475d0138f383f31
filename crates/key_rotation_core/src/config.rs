use crate::contract::ValidationError;

pub const DEFAULT_ALERT_AFTER_N_DAYS: i64 = 90;
pub const DEFAULT_SEND_EVERY_N_DAYS: i64 = 3;
pub const DEFAULT_SENDER_EMAIL_ADDRESS: &str = "support@example.com";
pub const DEFAULT_SES_REGION_NAME: &str = "us-west-2";
pub const DEFAULT_SUPPORT_CONTACT_EMAIL: &str = "support@example.com";

pub const ALERT_AFTER_N_DAYS_VAR: &str = "ALERT_AFTER_N_DAYS";
pub const SEND_EVERY_N_DAYS_VAR: &str = "SEND_EVERY_N_DAYS";
pub const SENDER_EMAIL_ADDRESS_VAR: &str = "SES_SENDER_EMAIL_ADDRESS";
pub const SES_REGION_NAME_VAR: &str = "SES_REGION_NAME";
pub const SUPPORT_CONTACT_EMAIL_VAR: &str = "SUPPORT_CONTACT_EMAIL";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderConfig {
    /// Keys at least this many days old are reported.
    pub alert_after_days: i64,
    /// How often the schedule fires; only quoted in the email.
    pub send_every_days: i64,
    pub sender_address: String,
    pub ses_region: String,
    pub support_contact: String,
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            alert_after_days: DEFAULT_ALERT_AFTER_N_DAYS,
            send_every_days: DEFAULT_SEND_EVERY_N_DAYS,
            sender_address: DEFAULT_SENDER_EMAIL_ADDRESS.to_string(),
            ses_region: DEFAULT_SES_REGION_NAME.to_string(),
            support_contact: DEFAULT_SUPPORT_CONTACT_EMAIL.to_string(),
        }
    }
}

impl ReminderConfig {
    pub fn from_env() -> Result<Self, ValidationError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the config from any variable source. Unset or blank variables
    /// fall back to their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ValidationError> {
        let read = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        Ok(Self {
            alert_after_days: parse_positive_days(
                ALERT_AFTER_N_DAYS_VAR,
                read(ALERT_AFTER_N_DAYS_VAR),
                DEFAULT_ALERT_AFTER_N_DAYS,
            )?,
            send_every_days: parse_positive_days(
                SEND_EVERY_N_DAYS_VAR,
                read(SEND_EVERY_N_DAYS_VAR),
                DEFAULT_SEND_EVERY_N_DAYS,
            )?,
            sender_address: parse_email(
                SENDER_EMAIL_ADDRESS_VAR,
                read(SENDER_EMAIL_ADDRESS_VAR),
                DEFAULT_SENDER_EMAIL_ADDRESS,
            )?,
            ses_region: read(SES_REGION_NAME_VAR)
                .unwrap_or_else(|| DEFAULT_SES_REGION_NAME.to_string()),
            support_contact: parse_email(
                SUPPORT_CONTACT_EMAIL_VAR,
                read(SUPPORT_CONTACT_EMAIL_VAR),
                DEFAULT_SUPPORT_CONTACT_EMAIL,
            )?,
        })
    }
}

fn parse_positive_days(
    name: &str,
    raw: Option<String>,
    default: i64,
) -> Result<i64, ValidationError> {
    let Some(raw) = raw else {
        return Ok(default);
    };
    match raw.parse::<i64>() {
        Ok(days) if days > 0 => Ok(days),
        _ => Err(ValidationError::new(format!(
            "{name} must be a positive integer, got '{raw}'"
        ))),
    }
}

fn parse_email(name: &str, raw: Option<String>, default: &str) -> Result<String, ValidationError> {
    let Some(raw) = raw else {
        return Ok(default.to_string());
    };
    match raw.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(raw),
        _ => Err(ValidationError::new(format!(
            "{name} must be an email address, got '{raw}'"
        ))),
    }
}
