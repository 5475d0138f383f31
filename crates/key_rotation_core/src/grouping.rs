use std::collections::HashMap;

use crate::contract::{AccessKey, UserTag, EMAIL_TAG_KEY};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OwnerEmail {
    Found(String),
    NoEmailTag,
    MissingTags,
}

/// Groups keys by owner. Groups come out in the order their owner first
/// appears, and keys keep their relative order inside a group.
pub fn group_by_user(keys: impl IntoIterator<Item = AccessKey>) -> Vec<(String, Vec<AccessKey>)> {
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<(String, Vec<AccessKey>)> = Vec::new();

    for key in keys {
        match positions.get(&key.user_name) {
            Some(&index) => groups[index].1.push(key),
            None => {
                positions.insert(key.user_name.clone(), groups.len());
                groups.push((key.user_name.clone(), vec![key]));
            }
        }
    }

    groups
}

/// IAM keeps tag keys unique per user; if a duplicate ever shows up the last
/// one wins. A blank value counts as no email.
pub fn resolve_owner_email(tags: &[UserTag]) -> OwnerEmail {
    if tags.is_empty() {
        return OwnerEmail::MissingTags;
    }

    tags.iter()
        .rev()
        .find(|tag| tag.key == EMAIL_TAG_KEY)
        .map(|tag| tag.value.trim())
        .filter(|value| !value.is_empty())
        .map(|value| OwnerEmail::Found(value.to_string()))
        .unwrap_or(OwnerEmail::NoEmailTag)
}
