use std::env;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde::Serialize;

/// On-disk settings. Every key is optional; flags given on the command line win.
#[derive(Debug, Default, Deserialize, Serialize, Clone, PartialEq)]
pub struct ConfigFile {
    pub url: Option<String>,
    pub wordlist: Option<String>,
    pub placeholder: Option<String>,
    #[serde(alias = "threads")]
    pub concurrency: Option<usize>,
    pub timeout: Option<u64>,
    pub delay: Option<f64>,
    pub rate: Option<u32>,
    pub max_time: Option<u64>,
    pub method: Option<String>,
    pub headers: Option<Vec<String>>,
    pub data: Option<String>,
    pub insecure: Option<bool>,
    pub follow_redirects: Option<bool>,
    pub proxy: Option<String>,
    pub filter_status: Option<String>,
    pub filter_size: Option<String>,
    pub filter_lines: Option<String>,
    pub filter_words: Option<String>,
    pub filter_errors: Option<String>,
    pub match_status: Option<String>,
    pub match_size: Option<String>,
    pub match_lines: Option<String>,
    pub match_words: Option<String>,
    pub output: Option<String>,
    pub output_format: Option<String>,
    pub no_color: Option<bool>,
}

fn home_dir() -> Option<PathBuf> {
    env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(|| env::var_os("USERPROFILE").map(PathBuf::from))
        .or_else(|| {
            let drive = env::var_os("HOMEDRIVE")?;
            let path = env::var_os("HOMEPATH")?;
            Some(PathBuf::from(drive).join(path))
        })
}

pub fn default_config_path() -> Option<PathBuf> {
    Some(home_dir()?.join(".fuzzai").join("config.yml"))
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/").or_else(|| path.strip_prefix("~\\")) {
        if let Some(home) = home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

pub fn expand_tilde_string(path: &str) -> String {
    expand_tilde(path).to_string_lossy().to_string()
}

pub fn load_config(path: &Path, allow_missing: bool) -> Result<ConfigFile, String> {
    match std::fs::read_to_string(path) {
        Ok(contents) => serde_yaml::from_str::<ConfigFile>(&contents)
            .map_err(|e| format!("failed to parse config '{}': {e}", path.display())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound && allow_missing => {
            Ok(ConfigFile::default())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(format!("config file not found '{}'", path.display()))
        }
        Err(e) => Err(format!("failed to read config '{}': {e}", path.display())),
    }
}

/// Resolves `--config`. A bare `default` means `~/.fuzzai/config.yml`, which
/// may be missing; an explicit path must exist.
pub fn load_from_arg(arg: &str) -> Result<ConfigFile, String> {
    if arg == "default" {
        let path = default_config_path()
            .ok_or_else(|| "cannot locate home directory for default config".to_string())?;
        return load_config(&path, true);
    }
    load_config(&expand_tilde(arg), false)
}

pub fn default_config_yaml() -> &'static str {
    r#"# fuzzai config
#
# Location (default):
#   ~/.fuzzai/config.yml
#
# Load it with: fuzzai --config default   (or --config <path>)
# Flags given on the command line always win over these values.

# Target and input
# url: https://example.com/FUZZ
# wordlist: ./wordlists/common.txt
placeholder: FUZZ

# Performance
concurrency: 10
timeout: 10
# delay: 0.1
rate: 0
# max_time: 600

# HTTP
method: GET
# headers:
#   - "Authorization: Bearer token"
# data: "user=FUZZ&pass=secret"
insecure: false
follow_redirects: false
# proxy: http://127.0.0.1:8080

# Filters (comma-separated numbers and MIN-MAX ranges)
filter_status: ""
filter_size: ""
filter_lines: ""
filter_words: ""
# refused,reset,dns,timeout,tls,malformed,other or all
filter_errors: ""

# Matchers
match_status: ""
match_size: ""
match_lines: ""
match_words: ""

# Output
# output: ./results.json
# output_format: json
no_color: false
"#
}

/// Writes the commented default config to `path` unless a file is already there.
pub fn ensure_default_config_file(path: &Path) -> Result<bool, String> {
    if path.exists() {
        return Ok(false);
    }
    let parent = path
        .parent()
        .ok_or_else(|| format!("invalid config path '{}'", path.display()))?;
    std::fs::create_dir_all(parent).map_err(|e| {
        format!(
            "failed to create config directory '{}': {e}",
            parent.display()
        )
    })?;
    std::fs::write(path, default_config_yaml())
        .map_err(|e| format!("failed to write config file '{}': {e}", path.display()))?;
    Ok(true)
}
