use serde::{Deserialize, Serialize};

use crate::contract::ValidationError;

const ACCOUNT_ID_LEN: usize = 12;

/// Twelve-digit AWS account identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccountId(String);

impl AccountId {
    pub fn parse(value: &str) -> Result<Self, ValidationError> {
        let trimmed = value.trim();
        if trimmed.len() != ACCOUNT_ID_LEN || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ValidationError::new(format!(
                "account id must be {ACCOUNT_ID_LEN} digits, got '{trimmed}'"
            )));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Reads the account field of an ARN such as
    /// `arn:aws:lambda:us-west-2:123456789012:function:reminder`.
    pub fn from_arn(arn: &str) -> Result<Self, ValidationError> {
        let parts = ArnParts::parse(arn)?;
        Self::parse(parts.account)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for AccountId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<AccountId> for String {
    fn from(value: AccountId) -> Self {
        value.0
    }
}

/// Borrowed view over the fields of an ARN. The resource field keeps any
/// further colons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArnParts<'a> {
    pub partition: &'a str,
    pub service: &'a str,
    pub region: &'a str,
    pub account: &'a str,
    pub resource: &'a str,
}

impl<'a> ArnParts<'a> {
    pub fn parse(arn: &'a str) -> Result<Self, ValidationError> {
        let mut fields = arn.trim().splitn(6, ':');
        let prefix = fields.next().unwrap_or_default();
        if prefix != "arn" {
            return Err(ValidationError::new(format!(
                "'{arn}' is not an ARN: missing 'arn' prefix"
            )));
        }

        let (Some(partition), Some(service), Some(region), Some(account), Some(resource)) = (
            fields.next(),
            fields.next(),
            fields.next(),
            fields.next(),
            fields.next(),
        ) else {
            return Err(ValidationError::new(format!(
                "'{arn}' is not an ARN: expected 6 colon-separated fields"
            )));
        };

        if partition.is_empty() || service.is_empty() || resource.is_empty() {
            return Err(ValidationError::new(format!(
                "'{arn}' is not an ARN: partition, service and resource are required"
            )));
        }

        Ok(Self {
            partition,
            service,
            region,
            account,
            resource,
        })
    }
}
