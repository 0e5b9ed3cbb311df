//! `.service` definition files.
//!
//! One `Key: value` directive per line:
//!
//! ```text
//! Name: dhcpcd
//! Description: DHCP client
//! Type: forking
//! Provides: net, net.dhcp
//! Needs: udev
//! Startup: /sbin/dhcpcd -q
//! Shutdown: /sbin/dhcpcd -x
//! PIDFile: /run/dhcpcd.pid
//! ```
//!
//! Lines that are not a known directive are ignored.

use super::validation::validate_definition;
use crate::error::{Error, Result};
use crate::service::{ServiceDefinition, ServiceKind};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// File extension of service definitions.
pub const SERVICE_EXTENSION: &str = "service";

#[derive(Debug, Default)]
struct Draft {
    name: Option<String>,
    description: Option<String>,
    kind: Option<ServiceKind>,
    provides: Vec<String>,
    needs: Vec<String>,
    startup: Option<String>,
    shutdown: Option<String>,
    check_alive: Option<String>,
    pid_file: Option<PathBuf>,
    auto_start: Option<bool>,
}

fn split_tags(value: &str, into: &mut Vec<String>) {
    into.extend(
        value
            .split(',')
            .map(str::trim)
            .filter(|tag| !tag.is_empty())
            .map(String::from),
    );
}

fn set_once(slot: &mut Option<String>, directive: &str, value: &str, origin: &str) -> Result<()> {
    if slot.is_some() {
        return Err(Error::Validation(format!(
            "{} sets {} more than once",
            origin, directive
        )));
    }
    *slot = Some(value.to_string());
    Ok(())
}

impl Draft {
    fn apply(&mut self, key: &str, value: &str, origin: &str) -> Result<()> {
        match key {
            "Name" => {
                self.name.get_or_insert_with(|| value.to_string());
            }
            "Description" => {
                self.description.get_or_insert_with(|| value.to_string());
            }
            "PIDFile" => {
                self.pid_file.get_or_insert_with(|| PathBuf::from(value));
            }
            "Type" => {
                if self.kind.is_none() {
                    let kind = value.parse().unwrap_or_else(|e| {
                        tracing::warn!("{}: {}, forcing Type=simple", origin, e);
                        ServiceKind::Simple
                    });
                    self.kind = Some(kind);
                }
            }
            "Provides" => split_tags(value, &mut self.provides),
            "Needs" => split_tags(value, &mut self.needs),
            "Startup" => set_once(&mut self.startup, key, value, origin)?,
            "Shutdown" => set_once(&mut self.shutdown, key, value, origin)?,
            "CheckAlive" => set_once(&mut self.check_alive, key, value, origin)?,
            "AutoStart" => {
                let auto_start = match value.to_ascii_lowercase().as_str() {
                    "true" | "yes" => true,
                    "false" | "no" => false,
                    other => {
                        return Err(Error::Validation(format!(
                            "{} has invalid AutoStart '{}', expected true or false",
                            origin, other
                        )))
                    }
                };
                self.auto_start.get_or_insert(auto_start);
            }
            _ => {}
        }
        Ok(())
    }

    fn finish(self) -> ServiceDefinition {
        ServiceDefinition {
            name: self.name.unwrap_or_default(),
            description: self.description,
            auto_start: self.auto_start.unwrap_or(true),
            provides: self.provides,
            needs: self.needs,
            kind: self.kind.unwrap_or_default(),
            pid_file: self.pid_file,
            check_alive: self.check_alive,
            startup: self.startup.unwrap_or_default(),
            shutdown: self.shutdown,
        }
    }
}

/// Parse and validate one definition. `origin` is used in error messages.
pub fn parse_definition(content: &str, origin: &str) -> Result<ServiceDefinition> {
    let mut draft = Draft::default();
    for line in content.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        draft.apply(key.trim(), value.trim(), origin)?;
    }
    let definition = draft.finish();
    validate_definition(&definition, origin)?;
    Ok(definition)
}

/// A definition file that could not be loaded.
#[derive(Debug)]
pub struct LoadFailure {
    pub file: PathBuf,
    pub error: Error,
}

/// Everything found in a services directory.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub definitions: Vec<ServiceDefinition>,
    pub failures: Vec<LoadFailure>,
}

/// Loads every `*.service` file of a directory.
#[derive(Debug, Clone)]
pub struct ServiceLoader {
    dir: PathBuf,
}

impl ServiceLoader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Load the directory, in file name order.
    ///
    /// A file with a configuration error is logged, reported in
    /// [`LoadReport::failures`] and skipped. Only an unreadable directory
    /// fails the whole load.
    pub fn load(&self) -> Result<LoadReport> {
        let entries = fs::read_dir(&self.dir).map_err(|e| {
            Error::Config(format!(
                "Failed to read services directory '{}': {}",
                self.dir.display(),
                e
            ))
        })?;

        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().map(|t| !t.is_dir()).unwrap_or(false))
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == SERVICE_EXTENSION))
            .collect();
        files.sort();

        let mut report = LoadReport::default();
        let mut names = HashSet::new();
        for file in files {
            match Self::load_file(&file) {
                Ok(definition) if !names.insert(definition.name.clone()) => {
                    let error = Error::Validation(format!(
                        "{} redefines service '{}'",
                        file.display(),
                        definition.name
                    ));
                    tracing::error!("{}", error);
                    report.failures.push(LoadFailure { file, error });
                }
                Ok(definition) => {
                    tracing::debug!(service = %definition.name, file = %file.display(), "Loaded service definition");
                    report.definitions.push(definition);
                }
                Err(error) => {
                    tracing::error!("Skipping {}: {}", file.display(), error);
                    report.failures.push(LoadFailure { file, error });
                }
            }
        }
        Ok(report)
    }

    fn load_file(path: &Path) -> Result<ServiceDefinition> {
        let content = fs::read_to_string(path)?;
        let origin = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        parse_definition(&content, &origin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_directives() {
        let def = parse_definition(
            "Name: dhcpcd\n\
             Description: DHCP client\n\
             Type: forking\n\
             Provides: net, net.dhcp\n\
             Needs: udev\n\
             Needs: syslog\n\
             Startup: /sbin/dhcpcd -q\n\
             Shutdown: /sbin/dhcpcd -x\n\
             PIDFile: /run/dhcpcd.pid\n\
             CheckAlive: pgrep dhcpcd\n\
             AutoStart: false\n",
            "dhcpcd.service",
        )
        .unwrap();
        assert_eq!(def.name, "dhcpcd");
        assert_eq!(def.description.as_deref(), Some("DHCP client"));
        assert_eq!(def.kind, ServiceKind::Forking);
        assert_eq!(def.provides, vec!["net", "net.dhcp"]);
        assert_eq!(def.needs, vec!["udev", "syslog"]);
        assert_eq!(def.startup, "/sbin/dhcpcd -q");
        assert_eq!(def.shutdown.as_deref(), Some("/sbin/dhcpcd -x"));
        assert_eq!(def.pid_file, Some(PathBuf::from("/run/dhcpcd.pid")));
        assert_eq!(def.check_alive.as_deref(), Some("pgrep dhcpcd"));
        assert!(!def.auto_start);
    }

    #[test]
    fn first_value_wins_for_name_and_type() {
        let def = parse_definition(
            "Name: a\nName: b\nType: oneshot\nType: simple\nStartup: true\n",
            "a.service",
        )
        .unwrap();
        assert_eq!(def.name, "a");
        assert_eq!(def.kind, ServiceKind::Oneshot);
        assert!(def.auto_start);
    }

    #[test]
    fn unknown_type_forces_simple() {
        let def = parse_definition("Name: a\nType: daemon\nStartup: x\n", "a.service").unwrap();
        assert_eq!(def.kind, ServiceKind::Simple);
    }

    #[test]
    fn duplicate_startup_is_rejected() {
        let err = parse_definition("Name: a\nStartup: x\nStartup: y\n", "a.service").unwrap_err();
        assert!(err.to_string().contains("Startup more than once"));
    }

    #[test]
    fn command_keeps_colons() {
        let def = parse_definition("Name: a\nStartup: echo a:b\n", "a.service").unwrap();
        assert_eq!(def.startup, "echo a:b");
    }
}
