use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Identifiant opaque d'un utilisateur (uuid côté backend).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NewsId(pub i64);

impl fmt::Display for NewsId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// PostgREST renders empty columns as `null`
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewsItem {
    pub id: NewsId,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub content: String,
    pub created_at: DateTime<Utc>,
    #[serde(rename = "likes", default, deserialize_with = "null_as_default")]
    reacting_users: BTreeSet<UserId>,
}

impl NewsItem {
    pub fn new(
        id: NewsId,
        title: impl Into<String>,
        content: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            title: title.into(),
            content: content.into(),
            created_at,
            reacting_users: BTreeSet::new(),
        }
    }

    pub fn with_reactions<I>(mut self, users: I) -> Self
    where
        I: IntoIterator<Item = UserId>,
    {
        self.reacting_users.extend(users);
        self
    }

    pub fn reacting_users(&self) -> &BTreeSet<UserId> {
        &self.reacting_users
    }

    /// Always the cardinality of the reacting-user set; never stored on its own.
    pub fn reaction_count(&self) -> usize {
        self.reacting_users.len()
    }

    pub fn has_reacted(&self, user: &UserId) -> bool {
        self.reacting_users.contains(user)
    }

    /// Adds or removes `user`. Returns whether the set changed.
    pub(crate) fn set_reaction(&mut self, user: &UserId, reacting: bool) -> bool {
        if reacting {
            self.reacting_users.insert(user.clone())
        } else {
            self.reacting_users.remove(user)
        }
    }

    pub(crate) fn replace_reactions(&mut self, users: BTreeSet<UserId>) {
        self.reacting_users = users;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Perk {
    pub id: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(alias = "company_name", default, deserialize_with = "null_as_default")]
    pub company: String,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
}

impl Perk {
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        self.latitude.zip(self.longitude)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Profile {
    pub id: UserId,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}
