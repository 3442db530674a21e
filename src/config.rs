//! Process-level settings for the façade.
//!
//! Settings are plain values injected into [`crate::Anyload`]; nothing here is
//! global. [`Settings::from_env`] is the only place the environment is read.

use std::path::{Path, PathBuf};

/// Environment variable overriding the staging root.
pub const TEMP_DIR_ENV: &str = "ANYLOAD_TEMP_DIR";
/// Environment variable holding the hub access token.
pub const HUB_TOKEN_ENV: &str = "HF_TOKEN";
/// Environment variable overriding the hub endpoint.
pub const HUB_ENDPOINT_ENV: &str = "HF_ENDPOINT";

pub const DEFAULT_HUB_ENDPOINT: &str = "https://huggingface.co";

const SYSTEM_DENY_LIST: &[&str] = &[
    "/etc",
    "/bin",
    "/sbin",
    "/usr/bin",
    "/usr/sbin",
    "/boot",
    "/dev",
    "/proc",
    "/sys",
    "/root/.ssh",
];

const HOME_DENY_LIST: &[&str] = &[".ssh", ".aws", ".gnupg", ".kube", ".docker", ".config/gcloud"];

/// How a hub URI with a sub-path is interpreted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum HubPathRule {
    /// Empty sub-path, or a final segment without a `.`, means "whole dataset".
    #[default]
    Heuristic,
    /// Any non-empty sub-path is a single file.
    AlwaysFile,
    /// Every hub URI is a whole dataset.
    AlwaysDataset,
}

impl HubPathRule {
    /// Parse the CLI spelling of a rule.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "heuristic" | "auto" => Some(HubPathRule::Heuristic),
            "file" => Some(HubPathRule::AlwaysFile),
            "dataset" => Some(HubPathRule::AlwaysDataset),
            _ => None,
        }
    }

    /// Whether `subpath` names a whole dataset under this rule.
    pub fn is_dataset(self, subpath: &str) -> bool {
        match self {
            HubPathRule::AlwaysDataset => true,
            HubPathRule::AlwaysFile => subpath.trim_matches('/').is_empty(),
            HubPathRule::Heuristic => {
                let trimmed = subpath.trim_end_matches('/');
                let last = trimmed.rsplit('/').next().unwrap_or_default();
                trimmed.is_empty() || !last.contains('.')
            }
        }
    }
}

/// Settings shared by every operation of one façade.
#[derive(Clone, Debug)]
pub struct Settings {
    /// Root under which per-call staging directories are created.
    pub staging_root: PathBuf,
    /// Path prefixes that downloads and uploads may never target.
    pub deny_list: Vec<PathBuf>,
    pub hub_token: Option<String>,
    pub hub_endpoint: String,
    pub hub_path_rule: HubPathRule,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            staging_root: default_staging_root(),
            deny_list: default_deny_list(std::env::var_os("HOME").map(PathBuf::from).as_deref()),
            hub_token: None,
            hub_endpoint: DEFAULT_HUB_ENDPOINT.to_string(),
            hub_path_rule: HubPathRule::default(),
        }
    }
}

impl Settings {
    /// Build settings from the process environment.
    pub fn from_env() -> Self {
        let mut settings = Self::default();
        if let Some(root) = non_empty_env(TEMP_DIR_ENV) {
            settings.staging_root = PathBuf::from(root);
        }
        settings.hub_token = non_empty_env(HUB_TOKEN_ENV);
        if let Some(endpoint) = non_empty_env(HUB_ENDPOINT_ENV) {
            settings.hub_endpoint = endpoint.trim_end_matches('/').to_string();
        }
        settings
    }

    pub fn with_staging_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.staging_root = root.into();
        self
    }

    pub fn with_deny_list(mut self, deny_list: Vec<PathBuf>) -> Self {
        self.deny_list = deny_list;
        self
    }

    pub fn with_hub_path_rule(mut self, rule: HubPathRule) -> Self {
        self.hub_path_rule = rule;
        self
    }

    pub fn with_hub_token(mut self, token: Option<String>) -> Self {
        self.hub_token = token;
        self
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn default_staging_root() -> PathBuf {
    std::env::temp_dir().join("anyload_temp")
}

/// Built-in deny-list: system directories plus credential stores under `home`.
pub fn default_deny_list(home: Option<&Path>) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = SYSTEM_DENY_LIST.iter().map(PathBuf::from).collect();
    if let Some(home) = home {
        paths.extend(HOME_DENY_LIST.iter().map(|rel| home.join(rel)));
    }
    paths
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heuristic_rule_matches_documented_shapes() {
        let rule = HubPathRule::Heuristic;
        assert!(rule.is_dataset(""));
        assert!(rule.is_dataset("data"));
        assert!(rule.is_dataset("data/"));
        assert!(rule.is_dataset("v1.0/train"));
        assert!(!rule.is_dataset("data/train.csv"));
        assert!(!rule.is_dataset("README.md"));
    }

    #[test]
    fn overrides_ignore_the_heuristic() {
        assert!(!HubPathRule::AlwaysFile.is_dataset("LICENSE"));
        assert!(HubPathRule::AlwaysFile.is_dataset(""));
        assert!(HubPathRule::AlwaysDataset.is_dataset("data/train.csv"));
    }

    #[test]
    fn rule_names_parse() {
        assert_eq!(HubPathRule::from_name("file"), Some(HubPathRule::AlwaysFile));
        assert_eq!(HubPathRule::from_name("Dataset"), Some(HubPathRule::AlwaysDataset));
        assert_eq!(HubPathRule::from_name("auto"), Some(HubPathRule::Heuristic));
        assert_eq!(HubPathRule::from_name("nope"), None);
    }

    #[test]
    fn deny_list_includes_home_credentials() {
        let list = default_deny_list(Some(Path::new("/home/alice")));
        assert!(list.contains(&PathBuf::from("/etc")));
        assert!(list.contains(&PathBuf::from("/home/alice/.aws")));
        assert!(!list.iter().any(|p| p == Path::new("/tmp")));
    }
}
