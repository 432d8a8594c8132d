use serde::{Deserialize, Serialize};

use super::{new_id, RecordId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VaultCategory {
    Login,
    Card,
    Identity,
    SecureNote,
    Other,
}

/// Plain part of a vault entry. Password and secure-note contents live in the
/// secret store keyed by the item id; the record only flags their presence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultItem {
    pub id: RecordId,
    pub title: String,
    pub category: VaultCategory,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "base64_bytes"
    )]
    pub image: Option<Vec<u8>>,
    #[serde(default)]
    pub has_secret: bool,
}

impl VaultItem {
    pub fn new(title: impl Into<String>, category: VaultCategory) -> Self {
        Self {
            id: new_id(),
            title: title.into(),
            category,
            username: None,
            url: None,
            notes: None,
            image: None,
            has_secret: false,
        }
    }
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultSecret {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secure_note: Option<String>,
}

impl VaultSecret {
    pub fn password(password: impl Into<String>) -> Self {
        Self {
            password: Some(password.into()),
            secure_note: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.password.is_none() && self.secure_note.is_none()
    }
}

impl std::fmt::Debug for VaultSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultSecret")
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("secure_note", &self.secure_note.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(bytes) => serializer.serialize_some(&STANDARD.encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = Option::<String>::deserialize(deserializer)?;
        encoded
            .map(|text| STANDARD.decode(text).map_err(serde::de::Error::custom))
            .transpose()
    }
}
