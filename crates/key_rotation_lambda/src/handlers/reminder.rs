use std::collections::HashSet;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{error, info};

use crate::adapters::directory::IdentityDirectory;
use crate::adapters::mailer::{EmailSender, OutboundEmail};
use crate::runtime::account::AccountId;
use crate::runtime::audit::{has_console_login, stale_keys};
use crate::runtime::config::ReminderConfig;
use crate::runtime::contract::{AccessKey, NotificationBatch, RunSummary, User};
use crate::runtime::grouping::{group_by_user, resolve_owner_email, OwnerEmail};
use crate::runtime::message::render_reminder;

/// Failures that abort the whole run. Anything scoped to a single user is
/// logged and counted in the [`RunSummary`] instead.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReminderError {
    #[error("failed to list users: {0}")]
    ListUsers(String),
    #[error("user listing reported more pages but returned no marker")]
    MissingMarker,
    #[error("user listing returned marker '{0}' twice in a row")]
    RepeatedMarker(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationContext {
    pub account_id: AccountId,
    pub now: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditOutcome {
    pub users_with_console_login: usize,
    pub stale_keys: Vec<AccessKey>,
    pub lookup_failures: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolutionOutcome {
    pub batches: Vec<NotificationBatch>,
    pub owners_without_email: usize,
    pub lookup_failures: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Sent { message_id: String },
    Failed { error: String },
}

pub fn handle_reminder_run(
    context: &InvocationContext,
    config: &ReminderConfig,
    directory: &impl IdentityDirectory,
    mailer: &impl EmailSender,
) -> Result<RunSummary, ReminderError> {
    info!(
        account_id = %context.account_id,
        alert_after_days = config.alert_after_days,
        "Starting access key audit"
    );

    let users = enumerate_users(directory)?;
    let audit = audit_users(&users, directory, context.now, config.alert_after_days);
    let groups = group_by_user(audit.stale_keys.iter().cloned());
    let owners_with_stale_keys = groups.len();
    let resolution = resolve_owners(groups, directory);

    let mut summary = RunSummary {
        account_id: context.account_id.to_string(),
        users_scanned: users.len(),
        users_with_console_login: audit.users_with_console_login,
        stale_keys: audit.stale_keys.len(),
        owners_with_stale_keys,
        owners_without_email: resolution.owners_without_email,
        lookup_failures: audit.lookup_failures + resolution.lookup_failures,
        ..RunSummary::default()
    };

    for batch in &resolution.batches {
        match notify_owner(batch, context, config, mailer) {
            DeliveryOutcome::Sent { .. } => summary.notifications_sent += 1,
            DeliveryOutcome::Failed { .. } => summary.notifications_failed += 1,
        }
    }

    info!(
        account_id = %summary.account_id,
        users_scanned = summary.users_scanned,
        stale_keys = summary.stale_keys,
        notifications_sent = summary.notifications_sent,
        notifications_failed = summary.notifications_failed,
        owners_without_email = summary.owners_without_email,
        lookup_failures = summary.lookup_failures,
        "Access key audit finished"
    );

    Ok(summary)
}

/// Walks every `ListUsers` page. Users repeated across pages are kept once,
/// at their first position.
pub fn enumerate_users(directory: &impl IdentityDirectory) -> Result<Vec<User>, ReminderError> {
    let mut users = Vec::new();
    let mut seen = HashSet::new();
    let mut marker: Option<String> = None;

    loop {
        let page = directory
            .list_users(marker.as_deref())
            .map_err(ReminderError::ListUsers)?;

        for user in page.users {
            if seen.insert(user.user_name.clone()) {
                users.push(user);
            }
        }

        if !page.is_truncated {
            break;
        }
        match page.marker {
            Some(next) if marker.as_deref() == Some(next.as_str()) => {
                return Err(ReminderError::RepeatedMarker(next));
            }
            Some(next) if !next.is_empty() => marker = Some(next),
            _ => return Err(ReminderError::MissingMarker),
        }
    }

    info!(users = users.len(), "Enumerated account users");
    Ok(users)
}

pub fn audit_users(
    users: &[User],
    directory: &impl IdentityDirectory,
    now: DateTime<Utc>,
    alert_after_days: i64,
) -> AuditOutcome {
    let mut outcome = AuditOutcome::default();

    for user in users.iter().filter(|user| has_console_login(user)) {
        outcome.users_with_console_login += 1;
        match directory.list_access_keys(&user.user_name) {
            Ok(keys) => outcome
                .stale_keys
                .extend(stale_keys(keys, now, alert_after_days)),
            Err(error) => {
                error!(
                    user_name = %user.user_name,
                    error = %error,
                    "Failed to list access keys, skipping user"
                );
                outcome.lookup_failures += 1;
            }
        }
    }

    outcome
}

pub fn resolve_owners(
    groups: Vec<(String, Vec<AccessKey>)>,
    directory: &impl IdentityDirectory,
) -> ResolutionOutcome {
    let mut outcome = ResolutionOutcome::default();

    for (user_name, keys) in groups {
        let tags = match directory.list_user_tags(&user_name) {
            Ok(tags) => tags,
            Err(error) => {
                error!(
                    user_name = %user_name,
                    error = %error,
                    "Failed to list user tags, skipping owner"
                );
                outcome.lookup_failures += 1;
                continue;
            }
        };

        match resolve_owner_email(&tags) {
            OwnerEmail::Found(email) => {
                info!(user_name = %user_name, email = %email, "Found email id");
                outcome.batches.push(NotificationBatch {
                    user_name,
                    email,
                    keys,
                });
            }
            OwnerEmail::NoEmailTag => {
                info!(user_name = %user_name, "No email found, skipping owner");
                outcome.owners_without_email += 1;
            }
            OwnerEmail::MissingTags => {
                info!(user_name = %user_name, "Missing tags, skipping owner");
                outcome.owners_without_email += 1;
            }
        }
    }

    outcome
}

/// Sends one reminder. Delivery errors are logged and reported, never
/// retried.
pub fn notify_owner(
    batch: &NotificationBatch,
    context: &InvocationContext,
    config: &ReminderConfig,
    mailer: &impl EmailSender,
) -> DeliveryOutcome {
    let message = render_reminder(batch, &context.account_id, config, context.now);
    let email = OutboundEmail {
        destination: batch.email.clone(),
        source: config.sender_address.clone(),
        subject: message.subject,
        body: message.body,
    };

    match mailer.send_email(&email) {
        Ok(message_id) => {
            info!(
                email = %batch.email,
                message_id = %message_id,
                "Notification email sent successfully"
            );
            DeliveryOutcome::Sent { message_id }
        }
        Err(error) => {
            error!(
                email = %batch.email,
                user_name = %batch.user_name,
                error = %error,
                "Notification email was not delivered"
            );
            DeliveryOutcome::Failed { error }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io;
    use std::sync::{Arc, Mutex};

    use chrono::{Duration, TimeZone};

    use super::*;
    use crate::runtime::contract::{KeyStatus, UserTag, UsersPage};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn user(name: &str, logged_in: bool) -> User {
        User {
            user_name: name.to_string(),
            password_last_used: logged_in.then(|| now() - Duration::days(1)),
        }
    }

    fn active_key(user_name: &str, id: &str, age_days: i64) -> AccessKey {
        AccessKey {
            user_name: user_name.to_string(),
            access_key_id: id.to_string(),
            status: KeyStatus::Active,
            create_date: now() - Duration::days(age_days),
        }
    }

    struct PagedDirectory {
        pages: Vec<Result<UsersPage, String>>,
        keys: HashMap<String, Result<Vec<AccessKey>, String>>,
        tags: HashMap<String, Result<Vec<UserTag>, String>>,
        markers: Mutex<Vec<Option<String>>>,
    }

    impl PagedDirectory {
        fn new(pages: Vec<Result<UsersPage, String>>) -> Self {
            Self {
                pages,
                keys: HashMap::new(),
                tags: HashMap::new(),
                markers: Mutex::new(Vec::new()),
            }
        }

        fn markers(&self) -> Vec<Option<String>> {
            self.markers.lock().expect("poisoned mutex").clone()
        }
    }

    impl IdentityDirectory for PagedDirectory {
        fn list_users(&self, marker: Option<&str>) -> Result<UsersPage, String> {
            let mut markers = self.markers.lock().expect("poisoned mutex");
            markers.push(marker.map(str::to_string));
            self.pages
                .get(markers.len() - 1)
                .cloned()
                .unwrap_or_else(|| Err("unexpected extra ListUsers call".to_string()))
        }

        fn list_access_keys(&self, user_name: &str) -> Result<Vec<AccessKey>, String> {
            self.keys.get(user_name).cloned().unwrap_or(Ok(Vec::new()))
        }

        fn list_user_tags(&self, user_name: &str) -> Result<Vec<UserTag>, String> {
            self.tags.get(user_name).cloned().unwrap_or(Ok(Vec::new()))
        }
    }

    struct RejectingMailer;

    impl EmailSender for RejectingMailer {
        fn send_email(&self, _email: &OutboundEmail) -> Result<String, String> {
            Err("Email address is not verified.".to_string())
        }
    }

    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl LogBuffer {
        fn lines(&self) -> Vec<String> {
            let bytes = self.0.lock().expect("poisoned mutex");
            String::from_utf8_lossy(&bytes)
                .lines()
                .map(str::to_string)
                .collect()
        }
    }

    impl io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().expect("poisoned mutex").extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for LogBuffer {
        type Writer = LogBuffer;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    fn with_captured_logs<R>(run: impl FnOnce() -> R) -> (R, Vec<String>) {
        let buffer = LogBuffer::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(buffer.clone())
            .with_max_level(tracing::Level::INFO)
            .with_ansi(false)
            .without_time()
            .finish();
        let result = tracing::subscriber::with_default(subscriber, run);
        (result, buffer.lines())
    }

    fn page(names: &[&str], marker: Option<&str>) -> Result<UsersPage, String> {
        Ok(UsersPage {
            users: names.iter().map(|name| user(name, true)).collect(),
            is_truncated: marker.is_some(),
            marker: marker.map(str::to_string),
        })
    }

    #[test]
    fn pagination_starts_without_marker_and_follows_each_page() {
        let directory = PagedDirectory::new(vec![
            page(&["alice", "bob"], Some("m1")),
            page(&["carol"], Some("m2")),
            page(&["dave"], None),
        ]);

        let users = enumerate_users(&directory).expect("enumeration should pass");
        let names: Vec<&str> = users.iter().map(|u| u.user_name.as_str()).collect();

        assert_eq!(names, vec!["alice", "bob", "carol", "dave"]);
        assert_eq!(
            directory.markers(),
            vec![None, Some("m1".to_string()), Some("m2".to_string())]
        );
    }

    #[test]
    fn users_repeated_across_pages_are_kept_once() {
        let directory = PagedDirectory::new(vec![
            page(&["alice", "bob"], Some("m1")),
            page(&["bob", "carol"], None),
        ]);

        let users = enumerate_users(&directory).expect("enumeration should pass");
        let names: Vec<&str> = users.iter().map(|u| u.user_name.as_str()).collect();
        assert_eq!(names, vec!["alice", "bob", "carol"]);
    }

    #[test]
    fn truncated_page_without_marker_fails() {
        let directory = PagedDirectory::new(vec![Ok(UsersPage {
            users: vec![user("alice", true)],
            is_truncated: true,
            marker: None,
        })]);

        let error = enumerate_users(&directory).expect_err("missing marker should fail");
        assert_eq!(error, ReminderError::MissingMarker);
    }

    #[test]
    fn repeated_marker_stops_pagination() {
        let directory = PagedDirectory::new(vec![
            page(&["alice"], Some("m1")),
            page(&["bob"], Some("m1")),
            page(&["carol"], None),
        ]);

        let error = enumerate_users(&directory).expect_err("stuck marker should fail");
        assert_eq!(error, ReminderError::RepeatedMarker("m1".to_string()));
        assert_eq!(directory.markers().len(), 2);
    }

    #[test]
    fn list_users_failure_aborts_run() {
        let directory = PagedDirectory::new(vec![
            page(&["alice"], Some("m1")),
            Err("AccessDenied: iam:ListUsers".to_string()),
        ]);

        let error = enumerate_users(&directory).expect_err("listing failure should abort");
        assert_eq!(
            error.to_string(),
            "failed to list users: AccessDenied: iam:ListUsers"
        );
    }

    #[test]
    fn audit_skips_users_without_console_login() {
        let mut directory = PagedDirectory::new(Vec::new());
        directory.keys.insert(
            "deployer".to_string(),
            Ok(vec![active_key("deployer", "AKIADEPLOY", 400)]),
        );
        directory.keys.insert(
            "alice".to_string(),
            Ok(vec![active_key("alice", "AKIAALICE", 100)]),
        );

        let users = vec![user("deployer", false), user("alice", true)];
        let outcome = audit_users(&users, &directory, now(), 90);

        assert_eq!(outcome.users_with_console_login, 1);
        assert_eq!(
            outcome.stale_keys,
            vec![active_key("alice", "AKIAALICE", 100)]
        );
    }

    #[test]
    fn key_listing_failure_is_isolated_to_its_user() {
        let mut directory = PagedDirectory::new(Vec::new());
        directory
            .keys
            .insert("alice".to_string(), Err("Throttling".to_string()));
        directory.keys.insert(
            "bob".to_string(),
            Ok(vec![active_key("bob", "AKIABOB", 95)]),
        );

        let users = vec![user("alice", true), user("bob", true)];
        let outcome = audit_users(&users, &directory, now(), 90);

        assert_eq!(outcome.lookup_failures, 1);
        assert_eq!(outcome.stale_keys.len(), 1);
        assert_eq!(outcome.stale_keys[0].user_name, "bob");
    }

    #[test]
    fn owners_without_tags_or_email_are_skipped() {
        let mut directory = PagedDirectory::new(Vec::new());
        directory.tags.insert("alice".to_string(), Ok(Vec::new()));
        directory.tags.insert(
            "bob".to_string(),
            Ok(vec![UserTag {
                key: "team".to_string(),
                value: "x".to_string(),
            }]),
        );

        let groups = group_by_user(vec![
            active_key("alice", "AKIAALICE", 100),
            active_key("bob", "AKIABOB", 100),
        ]);
        let (outcome, logs) = with_captured_logs(|| resolve_owners(groups, &directory));

        assert!(outcome.batches.is_empty());
        assert_eq!(outcome.owners_without_email, 2);
        assert_eq!(outcome.lookup_failures, 0);

        assert!(logs
            .iter()
            .any(|line| line.contains("Missing tags, skipping owner") && line.contains("alice")));
        assert!(logs
            .iter()
            .any(|line| line.contains("No email found, skipping owner") && line.contains("bob")));
    }

    #[test]
    fn delivery_failure_is_reported_not_raised() {
        let context = InvocationContext {
            account_id: AccountId::parse("123456789012").unwrap(),
            now: now(),
        };
        let batch = NotificationBatch {
            user_name: "alice".to_string(),
            email: "alice@example.com".to_string(),
            keys: vec![active_key("alice", "AKIAALICE", 120)],
        };

        let outcome = notify_owner(
            &batch,
            &context,
            &ReminderConfig::default(),
            &RejectingMailer,
        );
        assert_eq!(
            outcome,
            DeliveryOutcome::Failed {
                error: "Email address is not verified.".to_string()
            }
        );
    }
}
