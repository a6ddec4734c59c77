use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Username.
    pub id: String,
    pub full_name: String,
    pub email: String,
    pub active: bool,
    #[serde(default)]
    pub groups: BTreeSet<String>,
    #[serde(default)]
    pub roles: BTreeSet<String>,
}

impl User {
    pub fn new(id: &str, full_name: &str, email: &str) -> Self {
        Self {
            id: id.into(),
            full_name: full_name.into(),
            email: email.into(),
            active: true,
            groups: BTreeSet::new(),
            roles: BTreeSet::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: String,
    pub full_name: String,
    #[serde(default)]
    pub users: BTreeSet<String>,
    #[serde(default)]
    pub roles: BTreeSet<String>,
}

impl Group {
    pub fn new(id: &str, full_name: &str) -> Self {
        Self {
            id: id.into(),
            full_name: full_name.into(),
            users: BTreeSet::new(),
            roles: BTreeSet::new(),
        }
    }
}
