use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Remaining API allowance per time window
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiLimits {
    /// Requests left this minute
    #[serde(default)]
    pub minute: Option<i64>,

    /// Requests left this hour
    #[serde(default)]
    pub hour: Option<i64>,

    /// Requests left today
    #[serde(default)]
    pub day: Option<i64>,

    /// Requests left this month
    #[serde(default)]
    pub month: Option<i64>,
}

/// Account information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserInfo {
    /// Display name
    #[serde(default)]
    pub name: Option<String>,

    /// Subscription plan name
    #[serde(default)]
    pub plan: Option<String>,

    /// Remaining API allowance
    #[serde(default)]
    pub limits: ApiLimits,
}

/// A saved environment preset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserPreset {
    /// Preset identifier
    pub id: String,

    /// Preset display name
    pub name: String,

    /// Creation time
    #[serde(default)]
    pub created: Option<DateTime<Utc>>,

    /// Operating system identifier
    pub os: String,

    /// OS version
    #[serde(default)]
    pub version: Option<String>,

    /// Bitness
    #[serde(default)]
    pub bitness: Option<u8>,

    /// Software profile
    #[serde(default)]
    pub env_type: Option<String>,

    /// Browser
    #[serde(default)]
    pub browser: Option<String>,

    /// Guest locale
    #[serde(default)]
    pub locale: Option<String>,

    /// Execution timeout in seconds
    #[serde(default)]
    pub timeout: Option<u32>,

    /// Task visibility
    #[serde(default)]
    pub privacy: Option<String>,
}
