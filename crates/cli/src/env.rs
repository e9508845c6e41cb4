use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::CliError;

/// Environment variables from the process, optionally overlaid by a .env file.
#[derive(Debug, Clone)]
pub struct EnvManager {
    vars: HashMap<String, String>,
}

impl EnvManager {
    pub fn new() -> Self {
        Self {
            vars: std::env::vars().collect(),
        }
    }

    /// Loads `explicit` if given, else the first of `./.env` and
    /// `<config dir>/parlfetch/.env` that exists.
    pub fn discover(explicit: Option<&Path>) -> Result<Self, CliError> {
        let mut env = Self::new();
        match explicit {
            Some(path) => env.load_from_file(path)?,
            None => {
                if let Some(path) = Self::default_files().into_iter().find(|p| p.is_file()) {
                    env.load_from_file(path)?;
                }
            }
        }
        Ok(env)
    }

    fn default_files() -> Vec<PathBuf> {
        let mut files = vec![PathBuf::from(".env")];
        if let Some(dir) = dirs::config_dir() {
            files.push(dir.join("parlfetch").join(".env"));
        }
        files
    }

    /// Load variables from a .env file
    pub fn load_from_file<P: AsRef<Path>>(&mut self, path: P) -> Result<(), CliError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            CliError::Config(format!("Failed to read env file {}: {}", path.display(), e))
        })?;

        self.parse_env_content(&content)?;
        Ok(())
    }

    pub fn all(&self) -> &HashMap<String, String> {
        &self.vars
    }

    fn parse_env_content(&mut self, content: &str) -> Result<(), CliError> {
        for (line_num, line) in content.lines().enumerate() {
            let line = line.trim();

            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let line = line.strip_prefix("export ").unwrap_or(line);
            let Some((key, value)) = line.split_once('=') else {
                return Err(CliError::Config(format!(
                    "Invalid env file: malformed line {} (expected KEY=VALUE)",
                    line_num + 1
                )));
            };

            let key = key.trim();
            if key.is_empty() {
                return Err(CliError::Config(format!(
                    "Invalid env file: empty key at line {}",
                    line_num + 1
                )));
            }

            self.vars
                .insert(key.to_string(), Self::unquote_value(value));
        }

        Ok(())
    }

    fn unquote_value(value: &str) -> String {
        let value = value.trim();
        for quote in ['"', '\''] {
            if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
                return value[1..value.len() - 1].to_string();
            }
        }
        value.to_string()
    }
}

impl Default for EnvManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty() -> EnvManager {
        EnvManager {
            vars: HashMap::new(),
        }
    }

    #[test]
    fn test_parse_basic_env() {
        let mut env = empty();
        let content = r#"
# Comment
PARLFETCH_URL=http://localhost/odata.svc/
export PARLFETCH_RETRIES=3
        "#;

        env.parse_env_content(content).unwrap();
        assert_eq!(env.vars["PARLFETCH_URL"], "http://localhost/odata.svc/");
        assert_eq!(env.vars["PARLFETCH_RETRIES"], "3");
    }

    #[test]
    fn test_parse_quoted_values() {
        let mut env = empty();
        let content = r#"
QUOTED="value with spaces"
SINGLE='single quoted'
UNQUOTED=no_spaces
        "#;

        env.parse_env_content(content).unwrap();
        assert_eq!(env.vars["QUOTED"], "value with spaces");
        assert_eq!(env.vars["SINGLE"], "single quoted");
        assert_eq!(env.vars["UNQUOTED"], "no_spaces");
    }

    #[test]
    fn test_invalid_env_format() {
        let mut env = empty();
        assert!(env.parse_env_content("INVALID LINE WITHOUT EQUALS").is_err());
        assert!(env.parse_env_content("=value").is_err());
    }

    #[test]
    fn test_explicit_file_overrides_process_env() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.env");
        std::fs::write(&path, "PARLFETCH_BATCH_SIZE=250\n").unwrap();

        let env = EnvManager::discover(Some(&path)).unwrap();
        assert_eq!(env.all()["PARLFETCH_BATCH_SIZE"], "250");

        assert!(EnvManager::discover(Some(&dir.path().join("missing.env"))).is_err());
    }
}
