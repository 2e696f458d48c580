use serde::{Deserialize, Serialize};

fn default_branch() -> String {
    "master".to_string()
}

fn default_signing_backend() -> String {
    "local".to_string()
}

const fn default_keep_snapshots() -> bool {
    false
}

/// Repository-level configuration, loaded from `.loam/config.toml`. Every
/// field defaults so a missing file means "use defaults everywhere" —
/// callers should treat a missing config file as `RepoConfig::default()`,
/// not an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct RepoConfig {
    pub repo: RepoSection,
    pub signing: SigningSection,
    pub store: StoreSection,
}

impl Default for RepoConfig {
    fn default() -> Self {
        Self {
            repo: RepoSection::default(),
            signing: SigningSection::default(),
            store: StoreSection::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct RepoSection {
    #[serde(default = "default_branch")]
    pub default_branch: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

impl Default for RepoSection {
    fn default() -> Self {
        Self {
            default_branch: default_branch(),
            display_name: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct SigningSection {
    #[serde(default = "default_signing_backend")]
    pub backend: String,
    #[serde(default)]
    pub require_signatures: bool,
}

impl Default for SigningSection {
    fn default() -> Self {
        Self {
            backend: default_signing_backend(),
            require_signatures: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct StoreSection {
    #[serde(default)]
    pub root_override: Option<std::path::PathBuf>,
    #[serde(default = "default_keep_snapshots")]
    pub keep_snapshots: bool,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            root_override: None,
            keep_snapshots: default_keep_snapshots(),
        }
    }
}

impl RepoConfig {
    pub fn parse(toml_text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(toml_text)
    }

    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_yields_defaults() {
        let cfg = RepoConfig::parse("").unwrap();
        assert_eq!(cfg, RepoConfig::default());
        assert_eq!(cfg.repo.default_branch, "master");
    }

    #[test]
    fn unknown_field_is_rejected() {
        let err = RepoConfig::parse("[repo]\nbogus = true\n");
        assert!(err.is_err());
    }

    #[test]
    fn partial_section_fills_in_defaults() {
        let cfg = RepoConfig::parse("[repo]\ndefault_branch = \"trunk\"\n").unwrap();
        assert_eq!(cfg.repo.default_branch, "trunk");
        assert!(!cfg.signing.require_signatures);
    }

    #[test]
    fn roundtrips_through_toml() {
        let mut cfg = RepoConfig::default();
        cfg.repo.default_branch = "trunk".to_string();
        let text = cfg.to_toml().unwrap();
        let back = RepoConfig::parse(&text).unwrap();
        assert_eq!(cfg, back);
    }
}
