//! Fixtures shared by the unit tests.

use std::cell::RefCell;
use std::collections::BTreeMap;

use super::{
    config::{MetastoreConfig, Params},
    error::SetupError,
    hive::ArtifactFetcher,
    remote::{FileStore, ReachabilityProbe},
    schema::{Action, Invocation, SchemaMigrator},
};

/// Parameters for a postgres metastore with the given database type and Hive version.
pub fn params(dbtype: &str, hiveversion: &str) -> Params {
    Params {
        dbhost: "pg.example.com".into(),
        dbport: "5432".into(),
        jdbcurl: "jdbc:postgresql://pg.example.com:5432/metastore".into(),
        secretscope: "metastore".into(),
        dbtype: dbtype.into(),
        hiveversion: hiveversion.into(),
        ..Params::default()
    }
}

pub fn config(dbtype: &str, hiveversion: &str) -> MetastoreConfig {
    MetastoreConfig::from_params(&params(dbtype, hiveversion), false).unwrap()
}

/// A setup host that records what it is asked to do. Any operation whose event starts with
/// `fail_on` is recorded and then fails.
#[derive(Default)]
pub struct FakeHost {
    pub events: RefCell<Vec<String>>,
    pub files: RefCell<BTreeMap<String, (String, u32)>>,
    pub fail_on: Option<String>,
    pub unreachable: bool,
}

impl FakeHost {
    fn record(&self, event: String) -> Result<(), failure::Error> {
        let fail = match &self.fail_on {
            Some(prefix) => event.starts_with(prefix.as_str()),
            None => false,
        };

        self.events.borrow_mut().push(event.clone());

        if fail {
            Err(SetupError::CommandFailed {
                cmd: event,
                status: "exit status: 1".into(),
            }
            .into())
        } else {
            Ok(())
        }
    }
}

impl ArtifactFetcher for FakeHost {
    fn fetch_tarball(&self, url: &str, into_dir: &str) -> Result<(), failure::Error> {
        self.record(format!("tarball {} {}", url, into_dir))
    }

    fn fetch_file(&self, url: &str, file_name: &str) -> Result<(), failure::Error> {
        self.record(format!("fetch_file {} {}", file_name, url))
    }

    fn install_file(&self, file_name: &str, dir: &str) -> Result<(), failure::Error> {
        self.record(format!("install {} {}", file_name, dir))
    }

    fn copy_dir_contents(&self, from: &str, to: &str) -> Result<(), failure::Error> {
        self.record(format!("copy {} {}", from, to))
    }
}

impl FileStore for FakeHost {
    fn put(&self, path: &str, contents: &str, mode: u32) -> Result<(), failure::Error> {
        self.record(format!("put {} {:o}", path, mode))?;
        self.files
            .borrow_mut()
            .insert(path.into(), (contents.into(), mode));
        Ok(())
    }

    fn remove(&self, path: &str) -> Result<(), failure::Error> {
        self.record(format!("remove {}", path))?;
        self.files.borrow_mut().remove(path);
        Ok(())
    }
}

impl ReachabilityProbe for FakeHost {
    fn probe(&self, host: &str, port: u16) -> Result<(), failure::Error> {
        self.record(format!("probe {}:{}", host, port))?;

        if self.unreachable {
            Err(SetupError::Unreachable {
                host: host.into(),
                port,
            }
            .into())
        } else {
            Ok(())
        }
    }
}

impl SchemaMigrator for FakeHost {
    fn run_schema_tool(&self, invocation: &Invocation) -> Result<String, failure::Error> {
        let event = match invocation.action {
            Action::Init { target, dry_run } => {
                format!("schematool init {} dry_run={}", target, dry_run)
            }
            Action::Info => "schematool info".into(),
        };
        self.record(event)?;

        Ok("schemaTool completed".into())
    }
}
