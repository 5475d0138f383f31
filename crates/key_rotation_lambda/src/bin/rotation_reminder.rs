use aws_sdk_iam::types::StatusType;
use aws_sdk_sesv2::error::{DisplayErrorContext, ProvideErrorMetadata};
use aws_sdk_sesv2::types::{Body, Content, Destination, EmailContent, Message};
use chrono::{DateTime, Utc};
use key_rotation_lambda::adapters::directory::IdentityDirectory;
use key_rotation_lambda::adapters::mailer::{EmailSender, OutboundEmail};
use key_rotation_lambda::handlers::reminder::{handle_reminder_run, InvocationContext};
use key_rotation_lambda::runtime::account::AccountId;
use key_rotation_lambda::runtime::config::ReminderConfig;
use key_rotation_lambda::runtime::contract::{
    AccessKey, KeyStatus, User, UserTag, UsersPage, EMAIL_CHARSET,
};
use lambda_runtime::{service_fn, Error, LambdaEvent};
use serde::Deserialize;
use serde_json::Value;
use tracing_subscriber::EnvFilter;

struct IamDirectory {
    iam_client: aws_sdk_iam::Client,
}

impl IdentityDirectory for IamDirectory {
    fn list_users(&self, marker: Option<&str>) -> Result<UsersPage, String> {
        let client = self.iam_client.clone();
        let marker = marker.map(str::to_string);

        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async move {
                let output = client
                    .list_users()
                    .set_marker(marker)
                    .send()
                    .await
                    .map_err(|error| {
                        format!("failed to list users: {}", provider_message(&error))
                    })?;

                let users = output
                    .users()
                    .iter()
                    .map(|user| User {
                        user_name: user.user_name().to_string(),
                        password_last_used: user.password_last_used().and_then(to_chrono),
                    })
                    .collect();

                Ok::<_, String>(UsersPage {
                    users,
                    is_truncated: output.is_truncated(),
                    marker: output.marker().map(str::to_string),
                })
            })
        })
    }

    fn list_access_keys(&self, user_name: &str) -> Result<Vec<AccessKey>, String> {
        let client = self.iam_client.clone();
        let owner = user_name.to_string();

        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async move {
                let output = client
                    .list_access_keys()
                    .user_name(owner.clone())
                    .send()
                    .await
                    .map_err(|error| {
                        format!(
                            "failed to list access keys for {owner}: {}",
                            provider_message(&error)
                        )
                    })?;

                output
                    .access_key_metadata()
                    .iter()
                    .map(|metadata| -> Result<AccessKey, String> {
                        let access_key_id = metadata
                            .access_key_id()
                            .ok_or_else(|| format!("access key of {owner} has no id"))?;
                        let create_date = metadata
                            .create_date()
                            .and_then(to_chrono)
                            .ok_or_else(|| {
                                format!("access key {access_key_id} has no creation date")
                            })?;
                        let status = match metadata.status() {
                            Some(StatusType::Active) => KeyStatus::Active,
                            _ => KeyStatus::Inactive,
                        };
                        Ok(AccessKey {
                            user_name: metadata
                                .user_name()
                                .unwrap_or(owner.as_str())
                                .to_string(),
                            access_key_id: access_key_id.to_string(),
                            status,
                            create_date,
                        })
                    })
                    .collect::<Result<Vec<_>, String>>()
            })
        })
    }

    fn list_user_tags(&self, user_name: &str) -> Result<Vec<UserTag>, String> {
        let client = self.iam_client.clone();
        let owner = user_name.to_string();

        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async move {
                let output = client
                    .list_user_tags()
                    .user_name(owner.clone())
                    .send()
                    .await
                    .map_err(|error| {
                        format!(
                            "failed to list tags for {owner}: {}",
                            provider_message(&error)
                        )
                    })?;

                let tags: Vec<UserTag> = output
                    .tags()
                    .iter()
                    .map(|tag| UserTag {
                        key: tag.key().to_string(),
                        value: tag.value().to_string(),
                    })
                    .collect();
                Ok::<_, String>(tags)
            })
        })
    }
}

struct SesMailer {
    ses_client: aws_sdk_sesv2::Client,
}

impl EmailSender for SesMailer {
    fn send_email(&self, email: &OutboundEmail) -> Result<String, String> {
        let message = build_ses_message(email)?;
        let client = self.ses_client.clone();
        let destination = Destination::builder()
            .to_addresses(email.destination.clone())
            .build();
        let source = email.source.clone();

        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async move {
                client
                    .send_email()
                    .from_email_address(source)
                    .destination(destination)
                    .content(EmailContent::builder().simple(message).build())
                    .send()
                    .await
                    .map(|output| output.message_id().unwrap_or_default().to_string())
                    .map_err(|error| provider_message(&error))
            })
        })
    }
}

fn build_ses_message(email: &OutboundEmail) -> Result<Message, String> {
    let subject = Content::builder()
        .charset(EMAIL_CHARSET)
        .data(email.subject.clone())
        .build()
        .map_err(|error| format!("invalid email subject: {error}"))?;
    let text = Content::builder()
        .charset(EMAIL_CHARSET)
        .data(email.body.clone())
        .build()
        .map_err(|error| format!("invalid email body: {error}"))?;

    Ok(Message::builder()
        .subject(subject)
        .body(Body::builder().text(text).build())
        .build())
}

/// Prefers the message the service attached to the error over the SDK's
/// generic description.
fn provider_message<E>(error: &E) -> String
where
    E: ProvideErrorMetadata + std::error::Error,
{
    error
        .message()
        .map(str::to_string)
        .unwrap_or_else(|| DisplayErrorContext(error).to_string())
}

fn to_chrono(value: &aws_sdk_iam::primitives::DateTime) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(value.secs(), value.subsec_nanos())
}

/// Scheduled events carry no account id; manual invocations may pass one
/// to override the invoked function ARN.
#[derive(Debug, Default, Deserialize)]
struct ReminderEvent {
    #[serde(default)]
    account_id: Option<AccountId>,
}

fn decode_event(payload: Value) -> Result<ReminderEvent, Error> {
    if payload.is_null() {
        return Ok(ReminderEvent::default());
    }
    serde_json::from_value(payload)
        .map_err(|error| Error::from(format!("invalid reminder event: {error}")))
}

fn resolve_account_id(
    event: &ReminderEvent,
    invoked_function_arn: &str,
) -> Result<AccountId, Error> {
    match &event.account_id {
        Some(explicit) => Ok(explicit.clone()),
        None => AccountId::from_arn(invoked_function_arn)
            .map_err(|error| Error::from(format!("cannot determine account id: {error}"))),
    }
}

async fn handle_request(event: LambdaEvent<Value>) -> Result<Value, Error> {
    let config = ReminderConfig::from_env()
        .map_err(|error| Error::from(format!("invalid configuration: {error}")))?;
    let request = decode_event(event.payload)?;
    let account_id = resolve_account_id(&request, &event.context.invoked_function_arn)?;

    let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let ses_config = aws_sdk_sesv2::config::Builder::from(&aws_config)
        .region(aws_sdk_sesv2::config::Region::new(config.ses_region.clone()))
        .build();
    let directory = IamDirectory {
        iam_client: aws_sdk_iam::Client::new(&aws_config),
    };
    let mailer = SesMailer {
        ses_client: aws_sdk_sesv2::Client::from_conf(ses_config),
    };

    let context = InvocationContext {
        account_id,
        now: Utc::now(),
    };
    let summary = handle_reminder_run(&context, &config, &directory, &mailer)
        .map_err(|error| Error::from(error.to_string()))?;

    serde_json::to_value(summary)
        .map_err(|error| Error::from(format!("failed to serialize run summary: {error}")))
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_ansi(false)
        .with_target(false)
        .without_time()
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    init_tracing();
    lambda_runtime::run(service_fn(handle_request)).await
}
