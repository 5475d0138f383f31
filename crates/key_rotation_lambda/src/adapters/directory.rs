use crate::runtime::contract::{AccessKey, UserTag, UsersPage};

/// Read-only view of the account's identity directory.
pub trait IdentityDirectory {
    /// `marker` is `None` for the first page and the previous page's marker
    /// afterwards.
    fn list_users(&self, marker: Option<&str>) -> Result<UsersPage, String>;
    fn list_access_keys(&self, user_name: &str) -> Result<Vec<AccessKey>, String>;
    fn list_user_tags(&self, user_name: &str) -> Result<Vec<UserTag>, String>;
}
