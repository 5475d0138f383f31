#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundEmail {
    pub destination: String,
    pub source: String,
    pub subject: String,
    pub body: String,
}

pub trait EmailSender {
    /// Returns the provider message id, or the provider's error message.
    fn send_email(&self, email: &OutboundEmail) -> Result<String, String>;
}
