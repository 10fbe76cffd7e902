use serde::{Deserialize, Serialize};

/// Flat membership list attached to a resource.
///
/// Membership is binary -- a user id is either present or not. Permission
/// levels below "is a member" are expressed only on [`FileShareRecord`]
/// grants, never here.
///
/// [`FileShareRecord`]: crate::storage::models::FileShareRecord
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessList(Vec<String>);

impl AccessList {
    pub fn new<I, S>(members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut list = AccessList::default();
        for member in members {
            list.add(member.into());
        }
        list
    }

    /// A list containing a single member (typically the creator).
    pub fn single(member: impl Into<String>) -> Self {
        AccessList(vec![member.into()])
    }

    pub fn contains(&self, user_id: &str) -> bool {
        self.0.iter().any(|m| m == user_id)
    }

    /// Add a member. Returns false if the user was already present.
    pub fn add(&mut self, user_id: impl Into<String>) -> bool {
        let user_id = user_id.into();
        if self.contains(&user_id) {
            return false;
        }
        self.0.push(user_id);
        true
    }

    /// Remove a member. Returns false if the user was not present.
    pub fn remove(&mut self, user_id: &str) -> bool {
        let before = self.0.len();
        self.0.retain(|m| m != user_id);
        self.0.len() != before
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
