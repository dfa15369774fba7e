use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::status::TaskStatus;
use crate::error::{Result, SandpitError};

/// What kind of object a new task detonates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectType {
    /// Uploaded file content
    File,
    /// URL opened in a browser inside the VM
    Url,
    /// URL downloaded and then executed
    Download,
    /// Re-run of a previous task
    Rerun,
}

impl ObjectType {
    /// Wire value used in form submissions
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Url => "url",
            Self::Download => "download",
            Self::Rerun => "rerun",
        }
    }
}

/// Guest operating system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OsType {
    /// Microsoft Windows
    #[default]
    Windows,
    /// Linux (Ubuntu)
    Linux,
}

impl OsType {
    /// Wire value used in form submissions
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Windows => "windows",
            Self::Linux => "linux",
        }
    }
}

/// Guest OS bitness. Linux and Windows 11 are 64-bit only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Bitness {
    /// 32-bit
    #[serde(rename = "32")]
    X32,
    /// 64-bit
    #[default]
    #[serde(rename = "64")]
    X64,
}

impl Bitness {
    /// Wire value used in form submissions
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::X32 => "32",
            Self::X64 => "64",
        }
    }
}

/// Supported Windows versions
pub const WINDOWS_VERSIONS: &[&str] = &["7", "10", "11"];

/// Supported Linux versions
pub const LINUX_VERSIONS: &[&str] = &["22.04.2"];

/// Pre-installed software profile of the guest.
/// Linux environments only offer `Office`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvType {
    /// Bare OS install
    Clean,
    /// Office suite installed
    Office,
    /// Full software set
    Complete,
}

impl EnvType {
    /// Wire value used in form submissions
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Clean => "clean",
            Self::Office => "office",
            Self::Complete => "complete",
        }
    }
}

/// Browser used for URL detonation.
/// Linux supports only Chrome and Firefox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Browser {
    /// Google Chrome
    #[serde(rename = "Google Chrome")]
    Chrome,
    /// Mozilla Firefox
    #[serde(rename = "Mozilla Firefox")]
    Firefox,
    /// Internet Explorer (Windows only)
    #[serde(rename = "Internet Explorer")]
    InternetExplorer,
    /// Microsoft Edge (Windows only)
    #[serde(rename = "Microsoft Edge")]
    Edge,
}

impl Browser {
    /// Wire value used in form submissions
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Chrome => "Google Chrome",
            Self::Firefox => "Mozilla Firefox",
            Self::InternetExplorer => "Internet Explorer",
            Self::Edge => "Microsoft Edge",
        }
    }
}

/// Who can see the finished task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Privacy {
    /// Visible to everyone
    Public,
    /// Visible to anyone with the link
    #[default]
    Bylink,
    /// Visible to the owner only
    Owner,
    /// Visible to the owner's team
    Byteam,
}

impl Privacy {
    /// Wire value used in form submissions
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Bylink => "bylink",
            Self::Owner => "owner",
            Self::Byteam => "byteam",
        }
    }
}

/// Directory the object is placed in before execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StartFolder {
    /// Desktop
    Desktop,
    /// Downloads
    Downloads,
    /// Home directory
    Home,
    /// Temp directory
    #[default]
    Temp,
    /// %APPDATA% (Windows only)
    Appdata,
    /// Filesystem root (Windows only)
    Root,
    /// C:\Windows (Windows only)
    Windows,
}

impl StartFolder {
    /// Wire value used in form submissions
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Desktop => "desktop",
            Self::Downloads => "downloads",
            Self::Home => "home",
            Self::Temp => "temp",
            Self::Appdata => "appdata",
            Self::Root => "root",
            Self::Windows => "windows",
        }
    }

    /// Folders that exist on the Linux guests
    #[must_use]
    pub const fn available_on_linux(&self) -> bool {
        matches!(
            self,
            Self::Desktop | Self::Downloads | Self::Home | Self::Temp
        )
    }
}

/// The object a new task detonates, together with its type-specific payload
#[derive(Debug, Clone)]
pub enum AnalysisTarget {
    /// Raw file content uploaded as multipart
    File {
        /// Filename reported to the guest
        filename: String,
        /// File bytes
        content: Vec<u8>,
    },
    /// URL opened in a browser
    Url(String),
    /// URL downloaded and executed
    Download(String),
    /// Re-run an earlier task by its identifier
    Rerun(String),
}

impl AnalysisTarget {
    /// The wire object type for this target
    #[must_use]
    pub const fn object_type(&self) -> ObjectType {
        match self {
            Self::File { .. } => ObjectType::File,
            Self::Url(_) => ObjectType::Url,
            Self::Download(_) => ObjectType::Download,
            Self::Rerun(_) => ObjectType::Rerun,
        }
    }
}

/// Parameters for submitting a new analysis.
///
/// Construct via [`AnalysisRequest::file`], [`AnalysisRequest::url`],
/// [`AnalysisRequest::download`] or [`AnalysisRequest::rerun`], then adjust
/// fields as needed. [`AnalysisRequest::validate`] enforces the environment
/// compatibility rules locally before anything is sent.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    /// What to detonate
    pub target: AnalysisTarget,

    /// Guest operating system
    pub env_os: OsType,

    /// OS version; must be one of [`WINDOWS_VERSIONS`] or [`LINUX_VERSIONS`]
    pub env_version: Option<String>,

    /// Guest bitness
    pub env_bitness: Bitness,

    /// Software profile
    pub env_type: Option<EnvType>,

    /// Guest locale, e.g. `en-US`
    pub env_locale: Option<String>,

    /// Command line used to start the object (Windows only)
    pub obj_ext_cmd: Option<String>,

    /// Browser for URL targets
    pub obj_ext_browser: Option<Browser>,

    /// User agent for download targets
    pub obj_ext_useragent: Option<String>,

    /// Auto-confirm the UAC prompt (Windows only)
    pub auto_confirm_uac: bool,

    /// Execute as root (Linux only)
    pub run_as_root: bool,

    /// Folder the object starts from
    pub obj_ext_startfolder: StartFolder,

    /// Outbound network access for the guest
    pub opt_network_connect: bool,

    /// Simulate the network instead of connecting out
    pub opt_network_fakenet: bool,

    /// Route guest traffic through TOR
    pub opt_network_tor: bool,

    /// HTTPS MITM proxy inside the guest
    pub opt_network_mitm: bool,

    /// Task visibility
    pub opt_privacy_type: Privacy,

    /// Hide the source URL on the public task page
    pub opt_privacy_hidesource: bool,

    /// Automated interactivity (ML-driven clicking) in the guest
    pub opt_automated_interactivity: bool,

    /// Comma-separated tags, `[a-zA-Z0-9-]`, max 8 tags of 16 chars each
    pub user_tags: Option<String>,
}

impl AnalysisRequest {
    fn with_target(target: AnalysisTarget) -> Self {
        Self {
            target,
            env_os: OsType::Windows,
            env_version: None,
            env_bitness: Bitness::X64,
            env_type: None,
            env_locale: None,
            obj_ext_cmd: None,
            obj_ext_browser: None,
            obj_ext_useragent: None,
            auto_confirm_uac: true,
            run_as_root: false,
            obj_ext_startfolder: StartFolder::Temp,
            opt_network_connect: true,
            opt_network_fakenet: false,
            opt_network_tor: false,
            opt_network_mitm: false,
            opt_privacy_type: Privacy::Bylink,
            opt_privacy_hidesource: false,
            opt_automated_interactivity: true,
            user_tags: None,
        }
    }

    /// Submit raw file content
    #[must_use]
    pub fn file(filename: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self::with_target(AnalysisTarget::File {
            filename: filename.into(),
            content: content.into(),
        })
    }

    /// Open a URL in a browser inside the guest
    #[must_use]
    pub fn url(url: impl Into<String>) -> Self {
        Self::with_target(AnalysisTarget::Url(url.into()))
    }

    /// Download a URL inside the guest and execute the result
    #[must_use]
    pub fn download(url: impl Into<String>) -> Self {
        Self::with_target(AnalysisTarget::Download(url.into()))
    }

    /// Re-run a previous task
    #[must_use]
    pub fn rerun(task_id: impl Into<String>) -> Self {
        Self::with_target(AnalysisTarget::Rerun(task_id.into()))
    }

    /// Check environment compatibility rules before submission.
    ///
    /// # Errors
    ///
    /// Returns [`SandpitError::Validation`] describing the first violated
    /// rule. Validation failures never reach the network.
    pub fn validate(&self) -> Result<()> {
        match &self.target {
            AnalysisTarget::File { filename, content } => {
                if filename.is_empty() {
                    return Err(SandpitError::Validation("filename must not be empty".into()));
                }
                if content.is_empty() {
                    return Err(SandpitError::Validation(
                        "file content must not be empty".into(),
                    ));
                }
            }
            AnalysisTarget::Url(url) | AnalysisTarget::Download(url) => {
                url::Url::parse(url)
                    .map_err(|e| SandpitError::Validation(format!("invalid object URL: {e}")))?;
            }
            AnalysisTarget::Rerun(task_id) => {
                if task_id.is_empty() {
                    return Err(SandpitError::Validation(
                        "rerun requires a task identifier".into(),
                    ));
                }
            }
        }

        if let Some(version) = &self.env_version {
            let known = match self.env_os {
                OsType::Windows => WINDOWS_VERSIONS,
                OsType::Linux => LINUX_VERSIONS,
            };
            if !known.contains(&version.as_str()) {
                return Err(SandpitError::Validation(format!(
                    "unknown {} version: {version}",
                    self.env_os.as_str()
                )));
            }
        }

        if self.env_os == OsType::Linux {
            if self.env_bitness != Bitness::X64 {
                return Err(SandpitError::Validation(
                    "Linux environments are 64-bit only".into(),
                ));
            }
            if matches!(self.env_type, Some(t) if t != EnvType::Office) {
                return Err(SandpitError::Validation(
                    "Linux environments only offer the office profile".into(),
                ));
            }
            if matches!(
                self.obj_ext_browser,
                Some(Browser::InternetExplorer | Browser::Edge)
            ) {
                return Err(SandpitError::Validation(
                    "Linux supports only Chrome and Firefox".into(),
                ));
            }
            if !self.obj_ext_startfolder.available_on_linux() {
                return Err(SandpitError::Validation(format!(
                    "start folder {} does not exist on Linux",
                    self.obj_ext_startfolder.as_str()
                )));
            }
        }

        if self.env_os == OsType::Windows
            && self.env_version.as_deref() == Some("11")
            && self.env_bitness != Bitness::X64
        {
            return Err(SandpitError::Validation(
                "Windows 11 is 64-bit only".into(),
            ));
        }

        if let Some(cmd) = &self.obj_ext_cmd {
            if cmd.len() < 2 || cmd.len() > 256 {
                return Err(SandpitError::Validation(
                    "command line must be 2-256 characters".into(),
                ));
            }
        }

        if let Some(tags) = &self.user_tags {
            validate_user_tags(tags)?;
        }

        Ok(())
    }

    /// Flatten into form fields for the submission request.
    ///
    /// File content is not included; it travels as a multipart part.
    #[must_use]
    pub fn form_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![
            ("obj_type", self.target.object_type().as_str().to_string()),
            ("env_os", self.env_os.as_str().to_string()),
            ("env_bitness", self.env_bitness.as_str().to_string()),
            (
                "obj_ext_startfolder",
                self.obj_ext_startfolder.as_str().to_string(),
            ),
            (
                "opt_network_connect",
                self.opt_network_connect.to_string(),
            ),
            (
                "opt_network_fakenet",
                self.opt_network_fakenet.to_string(),
            ),
            ("opt_network_tor", self.opt_network_tor.to_string()),
            ("opt_network_mitm", self.opt_network_mitm.to_string()),
            (
                "opt_privacy_type",
                self.opt_privacy_type.as_str().to_string(),
            ),
            (
                "opt_privacy_hidesource",
                self.opt_privacy_hidesource.to_string(),
            ),
            (
                "opt_automated_interactivity",
                self.opt_automated_interactivity.to_string(),
            ),
            ("auto_confirm_uac", self.auto_confirm_uac.to_string()),
            ("run_as_root", self.run_as_root.to_string()),
        ];

        match &self.target {
            AnalysisTarget::File { .. } => {}
            AnalysisTarget::Url(url) | AnalysisTarget::Download(url) => {
                fields.push(("obj_url", url.clone()));
            }
            AnalysisTarget::Rerun(task_id) => {
                fields.push(("task_rerun_uuid", task_id.clone()));
            }
        }

        if let Some(v) = &self.env_version {
            fields.push(("env_version", v.clone()));
        }
        if let Some(t) = self.env_type {
            fields.push(("env_type", t.as_str().to_string()));
        }
        if let Some(l) = &self.env_locale {
            fields.push(("env_locale", l.clone()));
        }
        if let Some(c) = &self.obj_ext_cmd {
            fields.push(("obj_ext_cmd", c.clone()));
        }
        if let Some(b) = self.obj_ext_browser {
            fields.push(("obj_ext_browser", b.as_str().to_string()));
        }
        if let Some(ua) = &self.obj_ext_useragent {
            fields.push(("obj_ext_useragent", ua.clone()));
        }
        if let Some(tags) = &self.user_tags {
            fields.push(("user_tags", tags.clone()));
        }

        fields
    }
}

/// Tag list rules: comma-separated, `[a-zA-Z0-9-]` only, at most 8 tags of
/// 16 characters each
fn validate_user_tags(tags: &str) -> Result<()> {
    let parts: Vec<&str> = tags.split(',').collect();
    if parts.len() > 8 {
        return Err(SandpitError::Validation("at most 8 tags allowed".into()));
    }
    for tag in parts {
        if tag.is_empty() || tag.len() > 16 {
            return Err(SandpitError::Validation(
                "each tag must be 1-16 characters".into(),
            ));
        }
        if !tag.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(SandpitError::Validation(format!(
                "tag {tag:?} contains characters outside [a-zA-Z0-9-]"
            )));
        }
    }
    Ok(())
}

/// Full analysis record as returned by the result and status endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Analysis {
    /// Unique task identifier
    pub task_id: String,

    /// Current lifecycle state
    pub status: TaskStatus,

    /// Final verdict, present once the task completes
    #[serde(default)]
    pub verdict: Option<String>,

    /// Maliciousness score 0-100
    #[serde(default)]
    pub score: Option<u8>,

    /// Detected threat names
    #[serde(default)]
    pub threats: Vec<String>,

    /// System-assigned tags
    #[serde(default)]
    pub tags: Vec<String>,

    /// Submission time
    #[serde(default)]
    pub created: Option<DateTime<Utc>>,

    /// Completion time, if terminal
    #[serde(default)]
    pub completed: Option<DateTime<Utc>>,

    /// Link to the human-readable report
    #[serde(default)]
    pub report_url: Option<String>,
}

/// One row in a task-history listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisSummary {
    /// Unique task identifier
    pub task_id: String,

    /// Current lifecycle state
    pub status: TaskStatus,

    /// Final verdict, if any
    #[serde(default)]
    pub verdict: Option<String>,

    /// Submission time
    #[serde(default)]
    pub created: Option<DateTime<Utc>>,
}

/// Paginated task history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisList {
    /// Tasks in this page
    #[serde(default)]
    pub tasks: Vec<AnalysisSummary>,

    /// Total number of tasks matching the query
    #[serde(default)]
    pub total: Option<u64>,
}
