use serde::{Deserialize, Serialize};

/// One guest environment offered by the service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Environment {
    /// Operating system identifier, e.g. `windows` or `linux`
    pub os: String,

    /// Available OS versions
    #[serde(default)]
    pub versions: Vec<String>,

    /// Available bitness values
    #[serde(default)]
    pub bitness: Vec<u8>,

    /// Available software profiles
    #[serde(default)]
    pub env_types: Vec<String>,

    /// Installed browsers
    #[serde(default)]
    pub browsers: Vec<String>,
}

/// Catalog of available guest environments
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentInfo {
    /// All environments the account can use
    #[serde(default)]
    pub environments: Vec<Environment>,
}
