use std::env;
use std::ffi::OsString;
use std::path::PathBuf;

use serde::Deserialize;

use crate::descriptor::DEFAULT_DIRECTORY;
use crate::Error;

/// Environment variable holding the discovery roots, separated like `PATH`.
pub const PATH_ENV: &str = "FLOW_SPI_PATH";

/// Environment variable overriding the resource directory below each root.
pub const DIR_ENV: &str = "FLOW_SPI_DIR";

/// Where a [crate::Registry] looks for discovery resources.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Directories searched for `<directory>/<identity>` resources.
    pub roots: Vec<PathBuf>,

    pub directory: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            roots: Vec::new(),
            directory: DEFAULT_DIRECTORY.to_string(),
        }
    }
}

impl Config {
    /// Reads [PATH_ENV] and [DIR_ENV].
    pub fn from_env() -> Result<Self, Error> {
        Self::from_vars(env::var_os(PATH_ENV), env::var_os(DIR_ENV))
    }

    pub fn from_vars(path: Option<OsString>, directory: Option<OsString>) -> Result<Self, Error> {
        let mut config = Config::default();

        if let Some(path) = path {
            config.roots = env::split_paths(&path)
                .filter(|root| !root.as_os_str().is_empty())
                .collect();
        }

        if let Some(directory) = directory {
            let directory = directory
                .into_string()
                .map_err(|_| Error::InvalidConfig(format!("{} is not valid unicode", DIR_ENV)))?;
            config.directory = normalize_directory(&directory)?;
        }

        Ok(config)
    }
}

/// Strips surrounding whitespace and slashes from a resource directory, so
/// it always stays relative to the root it is probed below.
pub fn normalize_directory(raw: &str) -> Result<String, Error> {
    let directory = raw.trim().trim_matches('/');
    if directory.is_empty() {
        return Err(Error::InvalidConfig(format!(
            "resource directory {:?} is empty",
            raw
        )));
    }
    Ok(directory.to_string())
}

#[cfg(test)]
mod tests {
    use std::ffi::OsString;
    use std::path::PathBuf;

    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::Config;
    use crate::descriptor::DEFAULT_DIRECTORY;
    use crate::Error;

    #[test]
    fn defaults() {
        let config = Config::from_vars(None, None).unwrap();
        assert_eq!(Config::default(), config);
        assert_eq!(DEFAULT_DIRECTORY, config.directory);
    }

    #[cfg(unix)]
    #[test]
    fn roots_from_path() {
        let config = Config::from_vars(Some("/a::/b".into()), None).unwrap();
        assert_eq!(
            vec![PathBuf::from("/a"), PathBuf::from("/b")],
            config.roots
        );
    }

    #[rstest]
    #[case::plain("plugins", "plugins")]
    #[case::slashes("/META-INF/other/", "META-INF/other")]
    fn directory_override(#[case] raw: &str, #[case] expected: &str) {
        let config = Config::from_vars(None, Some(OsString::from(raw))).unwrap();
        assert_eq!(expected, config.directory);
    }

    #[test]
    fn empty_directory_rejected() {
        assert!(matches!(
            Config::from_vars(None, Some(" / ".into())),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn deserialize() {
        let config: Config = serde_json::from_str(r#"{"roots": ["/opt/flow"]}"#).unwrap();
        assert_eq!(vec![PathBuf::from("/opt/flow")], config.roots);
        assert_eq!(DEFAULT_DIRECTORY, config.directory);
    }

    #[test]
    fn deserialize_unknown_field() {
        assert!(serde_json::from_str::<Config>(r#"{"root": "/opt/flow"}"#).is_err());
    }
}
