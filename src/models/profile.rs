// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Profile row model and incremental changes to it.

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Mutable per-user record stored in the `profiles` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Profile {
    /// Backend user identifier (primary key)
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    /// Social handle
    #[serde(default)]
    pub instagram: Option<String>,
    #[serde(default)]
    #[cfg_attr(feature = "binding-generation", ts(type = "string | null"))]
    pub birthdate: Option<NaiveDate>,
    /// Granted by an administrator; unlocks member capabilities
    #[serde(default, deserialize_with = "null_as_false")]
    pub is_approved: bool,
    #[serde(default, deserialize_with = "null_as_false")]
    pub is_admin: bool,
}

fn null_as_false<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(false))
}

impl Profile {
    /// Shell installed when the profile cannot be fetched: no approval, no admin.
    pub fn degraded(id: &str) -> Self {
        Self {
            id: id.to_string(),
            email: None,
            phone_number: None,
            full_name: None,
            avatar_url: None,
            instagram: None,
            birthdate: None,
            is_approved: false,
            is_admin: false,
        }
    }

    /// Merge the fields present in `patch`; absent fields keep their value.
    ///
    /// The primary key never changes. A patch whose values do not fit the
    /// row shape is ignored as a whole. Returns whether anything changed.
    pub fn merge(&mut self, patch: &ProfilePatch) -> bool {
        if patch.is_empty() {
            return false;
        }

        let mut fields = match serde_json::to_value(&*self) {
            Ok(Value::Object(map)) => map,
            _ => return false,
        };
        for (key, value) in patch.fields() {
            if key == "id" {
                continue;
            }
            fields.insert(key.clone(), value.clone());
        }

        match serde_json::from_value::<Profile>(Value::Object(fields)) {
            Ok(merged) => {
                let changed = merged != *self;
                *self = merged;
                changed
            }
            Err(e) => {
                tracing::warn!(user_id = %self.id, error = %e, "Ignoring malformed profile patch");
                false
            }
        }
    }
}

/// Partial row payload from a realtime update notification.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProfilePatch(Map<String, Value>);

impl ProfilePatch {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Build from a JSON value; only objects are patches.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Interpret the patch as a whole row, when it carries one.
    pub fn to_profile(&self) -> Option<Profile> {
        serde_json::from_value(Value::Object(self.0.clone())).ok()
    }
}

/// Columns a user may write on their own row.
///
/// Approval and admin flags are deliberately absent: only administrators
/// change them, directly in the backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileUpsert {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instagram: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birthdate: Option<NaiveDate>,
}
