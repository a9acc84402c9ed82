use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default, Display, EnumString, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PromptStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

/// Standard prompts and mega (super) prompts carry separate category taxonomies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default, Display, EnumString, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CategoryKind {
    #[default]
    Prompt,
    Super,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default, Display, EnumString, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ProfileRole {
    #[default]
    User,
    Creator,
    Admin,
}

/// Path prefixes inside the single image bucket.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display, EnumString, AsRefStr)]
pub enum StorageFolder {
    #[strum(serialize = "prompts")]
    Prompts,
    #[strum(serialize = "avatars")]
    Avatars,
    #[strum(serialize = "rate-me")]
    RateMe,
    #[strum(serialize = "super")]
    Super,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum OAuthProvider {
    Google,
    Github,
    Discord,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default, Display, EnumString, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CheckoutEnvironment {
    #[default]
    Sandbox,
    Production,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_storage_folder_prefixes() {
        assert_eq!(StorageFolder::Prompts.as_ref(), "prompts");
        assert_eq!(StorageFolder::Avatars.as_ref(), "avatars");
        assert_eq!(StorageFolder::RateMe.as_ref(), "rate-me");
        assert_eq!(StorageFolder::Super.as_ref(), "super");
        assert_eq!(StorageFolder::from_str("rate-me").unwrap(), StorageFolder::RateMe);
    }

    #[test]
    fn test_status_wire_format() {
        assert_eq!(serde_json::to_string(&PromptStatus::Approved).unwrap(), "\"approved\"");
        assert_eq!(PromptStatus::Rejected.to_string(), "rejected");
    }
}
