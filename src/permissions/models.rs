use crate::store::Document;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// A named grant stored in its own collection; names are unique and lowercase.
pub trait Permission: Document {
    /// Used in error messages: "role", "right".
    const KIND: &'static str;

    fn new(name: String) -> Self;

    fn name(&self) -> &str;

    fn rename(&mut self, name: String);
}

/// Coarse-grained grant; every identity holds exactly one.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    pub id: Uuid,
    pub name: String,
    pub created_on: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_on: Option<DateTime<Utc>>,
}

/// Fine-grained grant, independent of the role.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Right {
    pub id: Uuid,
    pub name: String,
    pub created_on: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_on: Option<DateTime<Utc>>,
}

impl Document for Role {
    const COLLECTION: &'static str = "roles";
    const UNIQUE_FIELDS: &'static [&'static str] = &["name"];

    fn id(&self) -> Uuid {
        self.id
    }
}

impl Permission for Role {
    const KIND: &'static str = "role";

    fn new(name: String) -> Self {
        Self {
            id: Uuid::now_v7(),
            name,
            created_on: Utc::now(),
            updated_on: None,
        }
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn rename(&mut self, name: String) {
        self.name = name;
        self.updated_on = Some(Utc::now());
    }
}

impl Document for Right {
    const COLLECTION: &'static str = "rights";
    const UNIQUE_FIELDS: &'static [&'static str] = &["name"];

    fn id(&self) -> Uuid {
        self.id
    }
}

impl Permission for Right {
    const KIND: &'static str = "right";

    fn new(name: String) -> Self {
        Self {
            id: Uuid::now_v7(),
            name,
            created_on: Utc::now(),
            updated_on: None,
        }
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn rename(&mut self, name: String) {
        self.name = name;
        self.updated_on = Some(Utc::now());
    }
}
