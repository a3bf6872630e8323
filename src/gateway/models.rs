//! Wire models for the configuration service

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Ids arrive as JSON strings from some deployments and integers from others.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(i64),
}

impl From<RawId> for String {
    fn from(raw: RawId) -> Self {
        match raw {
            RawId::Text(s) => s,
            RawId::Number(n) => n.to_string(),
        }
    }
}

macro_rules! opaque_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                RawId::deserialize(deserializer).map(|raw| Self(raw.into()))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.pad(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }
    };
}

opaque_id!(
    /// Server-assigned profile identity. Never the display name.
    ProfileId
);

opaque_id!(
    /// Property identity within its profile. A rename yields a new id.
    PropertyId
);

/// A named, ordered, activatable container of properties
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: ProfileId,
    pub name: String,
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties_count: Option<usize>,
    /// Fields this client does not interpret, kept as received
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A name/value pair owned by one profile.
///
/// In the effective listing `profile` names the profile that supplied the value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    pub id: PropertyId,
    pub name: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<ProfileId>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One profile's definition of a property name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyBinding {
    pub id: PropertyId,
    pub name: String,
    pub value: String,
    pub profile_name: String,
    /// Whether the owning profile currently takes part in resolution
    pub active: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Every definition of a property name, highest precedence first.
///
/// The top-level binding is the one the service reports first; `ancestors`
/// follow in the service's order. Which binding wins is the service's call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyDetails {
    #[serde(flatten)]
    pub binding: PropertyBinding,
    #[serde(default)]
    pub ancestors: Vec<PropertyBinding>,
}

impl PropertyDetails {
    /// All bindings in the order the service sent them
    pub fn chain(&self) -> impl Iterator<Item = &PropertyBinding> {
        std::iter::once(&self.binding).chain(self.ancestors.iter())
    }
}

// Request bodies

#[derive(Debug, Serialize)]
pub(crate) struct NewProfile<'a> {
    pub name: &'a str,
    pub active: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct NewProperty<'a> {
    pub name: &'a str,
    pub value: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct ValueUpdate<'a> {
    pub value: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct Rename<'a> {
    pub new_name: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct DetailsQuery<'a> {
    pub name: &'a str,
}
