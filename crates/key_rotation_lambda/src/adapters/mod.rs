pub mod directory;
pub mod mailer;
