use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format as _, Json, Serialized, Toml, Yaml},
    Figment,
};
use hardfault_report::ReportOptions;
use serde::{Deserialize, Serialize};

use crate::util::logging::LevelFilter;

/// Configuration file name, without extension.
const CONFIG_FILE: &str = ".hardfault-report";

/// Prefix of environment variables overriding configuration keys.
const ENV_PREFIX: &str = "HARDFAULT_REPORT_";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Run an addr2line compatible tool once per address.
    External,
    /// Read the DWARF debug information of the image directly.
    Builtin,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub image: Option<PathBuf>,
    pub backend: Backend,
    pub addr2line: PathBuf,
    pub full_paths: bool,
    pub backtrace_limit: Option<usize>,
    pub cache_symbols: bool,
    pub log_level: Option<LevelFilter>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            image: None,
            backend: Backend::External,
            addr2line: PathBuf::from("arm-none-eabi-addr2line"),
            full_paths: false,
            backtrace_limit: None,
            cache_symbols: true,
            log_level: None,
        }
    }
}

impl Config {
    pub fn report_options(&self) -> ReportOptions {
        ReportOptions {
            full_paths: self.full_paths,
            backtrace_limit: self.backtrace_limit,
        }
    }
}

/// Directories searched for a configuration file, lowest precedence first.
pub fn search_paths() -> Vec<PathBuf> {
    let mut paths = vec![];
    if let Some(home) = directories::UserDirs::new().map(|user| user.home_dir().to_path_buf()) {
        paths.push(home);
    }
    paths.push(PathBuf::from("."));
    paths
}

/// Merges the defaults, every configuration file found in `paths` and the environment.
///
/// Later sources win, so a project local file overrides the one in the home directory and
/// `HARDFAULT_REPORT_*` variables override both.
pub fn load_config(paths: &[PathBuf]) -> Result<Config, figment::Error> {
    let mut figment = Figment::from(Serialized::defaults(Config::default()));
    for path in paths {
        figment = merge_files(figment, path);
    }

    figment.merge(Env::prefixed(ENV_PREFIX)).extract()
}

fn merge_files(figment: Figment, dir: &Path) -> Figment {
    figment
        .merge(Toml::file(dir.join(format!("{CONFIG_FILE}.toml"))))
        .merge(Json::file(dir.join(format!("{CONFIG_FILE}.json"))))
        .merge(Yaml::file(dir.join(format!("{CONFIG_FILE}.yaml"))))
        .merge(Yaml::file(dir.join(format!("{CONFIG_FILE}.yml"))))
}

#[cfg(test)]
mod tests {
    use figment::Jail;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn defaults_without_any_source() {
        Jail::expect_with(|jail| {
            let config = load_config(&[jail.directory().to_path_buf()])?;

            assert_eq!(config, Config::default());
            Ok(())
        });
    }

    #[test]
    fn files_and_environment_are_layered() {
        Jail::expect_with(|jail| {
            jail.create_dir("home")?;
            jail.create_dir("project")?;
            jail.create_file(
                "home/.hardfault-report.toml",
                r#"
                    addr2line = "/opt/gcc-arm/bin/arm-none-eabi-addr2line"
                    full_paths = true
                    backtrace_limit = 8
                "#,
            )?;
            jail.create_file(
                "project/.hardfault-report.yaml",
                "image: build/firmware.elf\nbacktrace_limit: 4\nlog_level: DEBUG\n",
            )?;
            jail.set_env("HARDFAULT_REPORT_BACKEND", "builtin");
            jail.set_env("HARDFAULT_REPORT_CACHE_SYMBOLS", "false");

            let root = jail.directory().to_path_buf();
            let config = load_config(&[root.join("home"), root.join("project")])?;

            assert_eq!(
                config,
                Config {
                    image: Some(PathBuf::from("build/firmware.elf")),
                    backend: Backend::Builtin,
                    addr2line: PathBuf::from("/opt/gcc-arm/bin/arm-none-eabi-addr2line"),
                    full_paths: true,
                    backtrace_limit: Some(4),
                    cache_symbols: false,
                    log_level: Some(LevelFilter::Debug),
                }
            );
            Ok(())
        });
    }

    #[test]
    fn unknown_keys_are_rejected() {
        Jail::expect_with(|jail| {
            jail.create_file(".hardfault-report.json", r#"{ "elf": "firmware.elf" }"#)?;

            assert!(load_config(&[jail.directory().to_path_buf()]).is_err());
            Ok(())
        });
    }
}
