// SPDX-FileCopyrightText: 2026 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File name searched for in every config location.
pub const CONFIG_FILE_NAME: &str = "dab-rs.toml";
const CONFIG_DIR_NAME: &str = "dab-rs";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {0}: {1}")]
    ReadError(PathBuf, String),

    #[error("Failed to parse config file {0}: {1}")]
    ParseError(PathBuf, String),

    #[error("Invalid configuration in {0}: {1}")]
    Invalid(PathBuf, String),
}

/// Default search paths for `dab-rs.toml`
/// (current directory, then XDG config, then /etc).
pub fn config_search_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(CONFIG_FILE_NAME)];
    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME));
    }
    paths.push(PathBuf::from("/etc").join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME));
    paths
}

/// Deserialize `[key]` out of TOML text read from `path`.
///
/// `Ok(None)` means the section is absent.
fn parse_section<T: DeserializeOwned>(
    path: &Path,
    content: &str,
    key: &str,
) -> Result<Option<T>, ConfigError> {
    let table: toml::Table = toml::from_str(content)
        .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;

    let Some(section) = table.get(key) else {
        return Ok(None);
    };

    // Round-trip through text so serde defaults fill missing fields.
    let section_toml = toml::to_string(section)
        .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;
    let cfg = toml::from_str::<T>(&section_toml)
        .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;
    Ok(Some(cfg))
}

fn load_section_from_file<T: DeserializeOwned>(
    path: &Path,
    key: &str,
) -> Result<Option<T>, ConfigError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::ReadError(path.to_path_buf(), e.to_string()))?;
    parse_section(path, &content, key)
}

/// A configuration struct living in one `[section]` of `dab-rs.toml`.
pub trait ConfigFile: Sized + Default + DeserializeOwned {
    /// Section key in `dab-rs.toml` (e.g. `"dab-server"`).
    fn section_key() -> &'static str;

    /// Semantic checks run after a successful parse.
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }

    /// Load and validate the section from a specific file. A file without
    /// the `[<section_key>]` header is an error.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let cfg = load_section_from_file::<Self>(path, Self::section_key())?.ok_or_else(|| {
            ConfigError::ParseError(
                path.to_path_buf(),
                format!("missing [{}] section", Self::section_key()),
            )
        })?;
        cfg.validate()
            .map_err(|e| ConfigError::Invalid(path.to_path_buf(), e))?;
        Ok(cfg)
    }

    /// Load the first file on `paths` that carries the section. Returns
    /// `(Default::default(), None)` when none does.
    fn load_from_paths(paths: &[PathBuf]) -> Result<(Self, Option<PathBuf>), ConfigError> {
        for path in paths {
            if !path.exists() {
                continue;
            }
            if let Some(cfg) = load_section_from_file::<Self>(path, Self::section_key())? {
                cfg.validate()
                    .map_err(|e| ConfigError::Invalid(path.clone(), e))?;
                return Ok((cfg, Some(path.clone())));
            }
            tracing::debug!("{} has no [{}] section", path.display(), Self::section_key());
        }
        Ok((Self::default(), None))
    }

    fn load_from_default_paths() -> Result<(Self, Option<PathBuf>), ConfigError> {
        Self::load_from_paths(&config_search_paths())
    }

    /// An explicit path wins; otherwise search the default locations.
    fn load(explicit: Option<&Path>) -> Result<(Self, Option<PathBuf>), ConfigError> {
        match explicit {
            Some(path) => Ok((Self::load_from_file(path)?, Some(path.to_path_buf()))),
            None => Self::load_from_default_paths(),
        }
    }

    /// Render `self` under its section header, for `--print-config`.
    fn to_section_toml(&self) -> Result<String, toml::ser::Error>
    where
        Self: Serialize,
    {
        let mut root = toml::Table::new();
        root.insert(
            Self::section_key().to_string(),
            toml::Value::try_from(self)?,
        );
        toml::to_string_pretty(&root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::io::Write;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    #[serde(default)]
    struct Probe {
        mode: u8,
        label: Option<String>,
    }

    impl ConfigFile for Probe {
        fn section_key() -> &'static str {
            "probe"
        }

        fn validate(&self) -> Result<(), String> {
            if self.mode > 4 {
                return Err(format!("mode {} out of range", self.mode));
            }
            Ok(())
        }
    }

    fn write(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(body.as_bytes()).unwrap();
        path
    }

    #[test]
    fn loads_section_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "a.toml", "[other]\nx = 1\n\n[probe]\nmode = 2\n");
        let cfg = Probe::load_from_file(&path).unwrap();
        assert_eq!(cfg, Probe { mode: 2, label: None });
    }

    #[test]
    fn missing_section_is_an_error_for_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "a.toml", "[other]\nx = 1\n");
        let err = Probe::load_from_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_, ref m) if m.contains("[probe]")));
    }

    #[test]
    fn validation_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "a.toml", "[probe]\nmode = 9\n");
        assert!(matches!(
            Probe::load_from_file(&path),
            Err(ConfigError::Invalid(_, _))
        ));
    }

    #[test]
    fn malformed_and_unreadable_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "bad.toml", "[probe\nmode = ");
        assert!(matches!(
            Probe::load_from_file(&path),
            Err(ConfigError::ParseError(_, _))
        ));
        assert!(matches!(
            Probe::load_from_file(&dir.path().join("absent.toml")),
            Err(ConfigError::ReadError(_, _))
        ));
    }

    #[test]
    fn search_takes_first_file_with_section() {
        let dir = tempfile::tempdir().unwrap();
        let without = write(dir.path(), "one.toml", "[other]\n");
        let with = write(dir.path(), "two.toml", "[probe]\nlabel = \"x\"\n");
        let missing = dir.path().join("zero.toml");

        let (cfg, found) =
            Probe::load_from_paths(&[missing.clone(), without.clone(), with.clone()]).unwrap();
        assert_eq!(found.as_deref(), Some(with.as_path()));
        assert_eq!(cfg.label.as_deref(), Some("x"));

        let (cfg, found) = Probe::load_from_paths(&[missing, without]).unwrap();
        assert_eq!(found, None);
        assert_eq!(cfg, Probe::default());
    }

    #[test]
    fn section_rendering_parses_back() {
        let cfg = Probe {
            mode: 3,
            label: Some("Mux".into()),
        };
        let text = cfg.to_section_toml().unwrap();
        assert!(text.contains("[probe]"));
        let back: Option<Probe> = parse_section(Path::new("inline"), &text, "probe").unwrap();
        assert_eq!(back, Some(cfg));
    }

    #[test]
    fn search_paths_end_in_etc() {
        let paths = config_search_paths();
        assert_eq!(paths[0], PathBuf::from(CONFIG_FILE_NAME));
        assert_eq!(
            paths.last().map(PathBuf::as_path),
            Some(Path::new("/etc/dab-rs/dab-rs.toml"))
        );
    }
}
