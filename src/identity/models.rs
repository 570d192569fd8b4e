use crate::store::Document;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Outstanding credential-recovery challenge.
///
/// A single field holds either stage, so the recovery and resetting hashes can never
/// both be present.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "camelCase")]
pub enum RecoveryChallenge {
    #[serde(rename_all = "camelCase")]
    Recovery { code_hash: String },
    #[serde(rename_all = "camelCase")]
    Resetting { code_hash: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub is_active: bool,
    pub is_verified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification_token_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recovery: Option<RecoveryChallenge>,
    pub role_id: Uuid,
    #[serde(default)]
    pub right_ids: Vec<Uuid>,
    pub created_on: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_on: Option<DateTime<Utc>>,
}

impl Document for Identity {
    const COLLECTION: &'static str = "identities";
    const UNIQUE_FIELDS: &'static [&'static str] = &["username", "email"];

    fn id(&self) -> Uuid {
        self.id
    }
}

impl Identity {
    #[must_use]
    pub fn recovery_code_hash(&self) -> Option<&str> {
        match &self.recovery {
            Some(RecoveryChallenge::Recovery { code_hash }) => Some(code_hash),
            _ => None,
        }
    }

    #[must_use]
    pub fn resetting_code_hash(&self) -> Option<&str> {
        match &self.recovery {
            Some(RecoveryChallenge::Resetting { code_hash }) => Some(code_hash),
            _ => None,
        }
    }

    /// Start (or restart) recovery; any resetting code is discarded.
    pub fn begin_recovery(&mut self, code_hash: String) {
        self.recovery = Some(RecoveryChallenge::Recovery { code_hash });
        self.touch();
    }

    /// Swap a verified recovery code for a resetting code.
    pub fn begin_resetting(&mut self, code_hash: String) {
        self.recovery = Some(RecoveryChallenge::Resetting { code_hash });
        self.touch();
    }

    /// Store a new password hash and end any recovery in progress.
    pub fn set_password_hash(&mut self, password_hash: String) {
        self.password_hash = password_hash;
        self.recovery = None;
        self.touch();
    }

    /// Only active, verified identities may authenticate.
    #[must_use]
    pub fn can_authenticate(&self) -> bool {
        self.is_active && self.is_verified
    }

    pub fn touch(&mut self) {
        self.updated_on = Some(Utc::now());
    }
}
