use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Category tag for a worker, used for default launch commands and routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WorkerCategory {
    Filesystem,
    VersionControl,
    Data,
    Web,
    Messaging,
    Other,
}

impl WorkerCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Filesystem => "filesystem",
            Self::VersionControl => "version-control",
            Self::Data => "data",
            Self::Web => "web",
            Self::Messaging => "messaging",
            Self::Other => "other",
        }
    }

    /// Built-in launch command for a category, used when the descriptor
    /// carries no explicit override.
    pub fn default_command(&self) -> Option<(&'static str, &'static [&'static str])> {
        match self {
            Self::Filesystem => Some(("npx", &["-y", "@modelcontextprotocol/server-filesystem", "."])),
            Self::VersionControl => Some(("npx", &["-y", "@modelcontextprotocol/server-git"])),
            Self::Data => Some(("npx", &["-y", "@modelcontextprotocol/server-sqlite"])),
            Self::Web => Some(("npx", &["-y", "@modelcontextprotocol/server-fetch"])),
            Self::Messaging | Self::Other => None,
        }
    }
}

impl std::fmt::Display for WorkerCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A credential a worker needs at launch, surfaced as an environment variable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialSpec {
    /// Environment variable name (e.g. `GITHUB_TOKEN`)
    pub name: String,

    /// Whether `enable` must refuse to start without it
    #[serde(default)]
    pub required: bool,
}

/// Immutable identity and launch template for a tool-provider worker.
///
/// Created once at catalog load; runtime overrides (credentials, extra env)
/// are layered on at spawn time and never merged back into the descriptor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerDescriptor {
    /// Stable identifier, unique across the catalog
    pub id: String,

    /// Human-readable display name
    pub name: String,

    /// Category tag, keys the built-in default launch commands
    pub category: WorkerCategory,

    /// Explicit launch command; wins over the category default
    #[serde(default)]
    pub command: Option<String>,

    /// Arguments for the explicit launch command
    #[serde(default)]
    pub args: Vec<String>,

    /// Environment variables always passed to the worker
    #[serde(default)]
    pub env: HashMap<String, String>,

    /// Working directory for the spawned process
    #[serde(default)]
    pub working_dir: Option<String>,

    /// Credentials the worker expects, each marked required or optional
    #[serde(default)]
    pub credentials: Vec<CredentialSpec>,

    /// Declared target platforms (e.g. "linux", "macos"); empty means all
    #[serde(default)]
    pub platforms: Vec<String>,

    /// Default configuration map layered under runtime overrides
    #[serde(default)]
    pub defaults: HashMap<String, String>,
}

impl WorkerDescriptor {
    /// Resolve the effective launch command and argument list.
    ///
    /// The explicit override wins; otherwise the category default applies.
    /// Returns `None` when neither can determine a command.
    pub fn resolve_command(&self) -> Option<(String, Vec<String>)> {
        if let Some(ref command) = self.command {
            return Some((command.clone(), self.args.clone()));
        }
        self.category
            .default_command()
            .map(|(cmd, args)| (cmd.to_string(), args.iter().map(|s| (*s).to_string()).collect()))
    }

    /// Names of credentials marked required.
    pub fn required_credentials(&self) -> impl Iterator<Item = &str> {
        self.credentials
            .iter()
            .filter(|c| c.required)
            .map(|c| c.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(category: WorkerCategory, command: Option<&str>) -> WorkerDescriptor {
        WorkerDescriptor {
            id: "w1".to_string(),
            name: "Worker One".to_string(),
            category,
            command: command.map(String::from),
            args: vec!["--flag".to_string()],
            env: HashMap::new(),
            working_dir: None,
            credentials: vec![],
            platforms: vec![],
            defaults: HashMap::new(),
        }
    }

    #[test]
    fn test_explicit_command_wins_over_default() {
        let desc = descriptor(WorkerCategory::Filesystem, Some("/usr/local/bin/fs-worker"));
        let (cmd, args) = desc.resolve_command().unwrap();
        assert_eq!(cmd, "/usr/local/bin/fs-worker");
        assert_eq!(args, vec!["--flag".to_string()]);
    }

    #[test]
    fn test_category_default_used_without_override() {
        let desc = descriptor(WorkerCategory::Filesystem, None);
        let (cmd, args) = desc.resolve_command().unwrap();
        assert_eq!(cmd, "npx");
        assert!(args.contains(&"@modelcontextprotocol/server-filesystem".to_string()));
    }

    #[test]
    fn test_unresolvable_command() {
        let desc = descriptor(WorkerCategory::Other, None);
        assert!(desc.resolve_command().is_none());
    }

    #[test]
    fn test_required_credentials_filter() {
        let mut desc = descriptor(WorkerCategory::Other, Some("worker"));
        desc.credentials = vec![
            CredentialSpec {
                name: "API_KEY".to_string(),
                required: true,
            },
            CredentialSpec {
                name: "REGION".to_string(),
                required: false,
            },
        ];
        let required: Vec<&str> = desc.required_credentials().collect();
        assert_eq!(required, vec!["API_KEY"]);
    }
}
