use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::{Path, PathBuf};

pub const DEFAULT_PRODUCT: &str = "repostat";
pub const DEFAULT_LINE_COUNTER: &str = "cloc";

const ENV_CACHE_DIR: &str = "REPOSTAT_CACHE_DIR";
const ENV_LINE_COUNTER: &str = "REPOSTAT_LINE_COUNTER";
const ENV_NO_EXTERNAL: &str = "REPOSTAT_NO_EXTERNAL_COUNTER";

const ANONYMOUS_USER: &str = "anonymous";

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    #[serde(default, skip_serializing)]
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self { username: username.into(), password: password.into() }
    }

    /// Placeholder that still works against public remotes.
    pub fn anonymous() -> Self {
        Self::new(ANONYMOUS_USER, "")
    }

    pub fn is_anonymous(&self) -> bool {
        self.username == ANONYMOUS_USER && self.password.is_empty()
    }
}

impl Default for Credentials {
    fn default() -> Self {
        Self::anonymous()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub cache_dir: PathBuf,
    pub product: String,
    pub line_counter_tool: String,
    pub use_external_counter: bool,
    pub progress: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cache_dir: std::env::temp_dir(),
            product: DEFAULT_PRODUCT.to_string(),
            line_counter_tool: DEFAULT_LINE_COUNTER.to_string(),
            use_external_counter: true,
            progress: false,
        }
    }
}

impl SessionConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(dir) = std::env::var_os(ENV_CACHE_DIR) {
            config.cache_dir = PathBuf::from(dir);
        }
        if let Ok(tool) = std::env::var(ENV_LINE_COUNTER) {
            if !tool.trim().is_empty() {
                config.line_counter_tool = tool;
            }
        }
        if std::env::var_os(ENV_NO_EXTERNAL).is_some() {
            config.use_external_counter = false;
        }
        config
    }

    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = dir.into();
        self
    }

    pub fn with_line_counter(mut self, tool: impl Into<String>) -> Self {
        self.line_counter_tool = tool.into();
        self
    }

    pub fn with_external_counter(mut self, enabled: bool) -> Self {
        self.use_external_counter = enabled;
        self
    }

    pub fn with_progress(mut self, enabled: bool) -> Self {
        self.progress = enabled;
        self
    }

    /// `<cache_dir>/<product>/<vcs_kind>/<sha256(url)>`
    pub fn mirror_path(&self, vcs_kind: &str, url: &str) -> PathBuf {
        mirror_path(&self.cache_dir, &self.product, vcs_kind, url)
    }
}

pub fn mirror_path(cache_dir: &Path, product: &str, vcs_kind: &str, url: &str) -> PathBuf {
    let digest = Sha256::digest(url.as_bytes());
    cache_dir.join(product).join(vcs_kind).join(hex::encode(digest))
}
