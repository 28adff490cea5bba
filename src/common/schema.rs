//! Initializing and inspecting the metastore schema with Hive's `schematool`.

use log::{info, warn};

use super::{
    config::{DbKind, InitFlag, MetastoreConfig},
    error::SetupError,
};

/// The schema versions schematool can initialize to. Every other Hive version is assumed to be
/// compatible with the newest one.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SchemaTarget {
    V2_2_0,
    V2_3_0,
    V3_1_0,
}

impl SchemaTarget {
    /// Pick the target for a requested Hive version by prefix. Never fails; anything that is not
    /// 2.2 or 2.3 (including garbage) maps to 3.1.0.
    pub fn for_version(version: &str) -> Self {
        if version.starts_with("2.2") {
            SchemaTarget::V2_2_0
        } else if version.starts_with("2.3") {
            SchemaTarget::V2_3_0
        } else {
            SchemaTarget::V3_1_0
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SchemaTarget::V2_2_0 => "2.2.0",
            SchemaTarget::V2_3_0 => "2.3.0",
            SchemaTarget::V3_1_0 => "3.1.0",
        }
    }
}

impl std::fmt::Display for SchemaTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What to ask schematool to do.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Action {
    Init { target: SchemaTarget, dry_run: bool },
    Info,
}

/// A single schematool run against the metastore database.
///
/// Connection settings and credentials are passed as references to the variables of the
/// environment snapshot (`env::ENV_FILE`), which the executor must source first.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Invocation {
    pub db_kind: DbKind,
    pub action: Action,
}

impl Invocation {
    pub fn init(db_kind: DbKind, target: SchemaTarget, dry_run: bool) -> Self {
        Invocation {
            db_kind,
            action: Action::Init { target, dry_run },
        }
    }

    pub fn info(db_kind: DbKind) -> Self {
        Invocation {
            db_kind,
            action: Action::Info,
        }
    }

    /// The schematool command line arguments.
    pub fn args(&self) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "-dbType".into(),
            self.db_kind.schema_tool_name().into(),
            "-url".into(),
            "\"$JDBCURL\"".into(),
            "-userName".into(),
            "\"$SQLUSER\"".into(),
            "-passWord".into(),
            "\"$SQLPASSWD\"".into(),
            "-driver".into(),
            "\"$JDBCDRIVER\"".into(),
        ];

        match self.action {
            Action::Init { target, dry_run } => {
                args.push("-initSchemaTo".into());
                args.push(target.as_str().into());
                args.push("-ifNotExists".into());
                if dry_run {
                    args.push("-dryRun".into());
                }
                args.push("--verbose".into());
            }
            Action::Info => args.push("-info".into()),
        }

        args
    }
}

/// Runs schematool. An unsuccessful run (non-zero exit) is an `Err`.
pub trait SchemaMigrator {
    /// Run `invocation`, returning its output.
    fn run_schema_tool(&self, invocation: &Invocation) -> Result<String, failure::Error>;
}

/// The result of `initialize`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum InitOutcome {
    /// The configuration did not ask for initialization.
    Skipped,
    Initialized(SchemaTarget),
}

/// Initialize the metastore schema if the configuration asks for it.
///
/// A dry run always goes first, and only a successful dry run lets the real initialization
/// happen. Nothing is retried or rolled back.
pub fn initialize<M: SchemaMigrator + ?Sized>(
    migrator: &M,
    config: &MetastoreConfig,
) -> Result<InitOutcome, failure::Error> {
    if config.init_schema == InitFlag::No {
        info!("Skipping metastore schema initialization");
        return Ok(InitOutcome::Skipped);
    }

    let target = SchemaTarget::for_version(config.hive_version.as_str());
    info!(
        "Initializing metastore schema to {} for Hive {}",
        target, config.hive_version
    );

    if let Err(err) = migrator.run_schema_tool(&Invocation::init(config.db_kind, target, true)) {
        warn!("schematool dry run failed: {}", err);
        return Err(SetupError::DryRunFailed {
            target: target.to_string(),
        }
        .into());
    }

    migrator.run_schema_tool(&Invocation::init(config.db_kind, target, false))?;

    Ok(InitOutcome::Initialized(target))
}

/// Ask schematool for the schema version of the metastore. A mismatch with the requested Hive
/// version is expected when that version is not 3.1.0, so it is only reported.
pub fn verify<M: SchemaMigrator + ?Sized>(
    migrator: &M,
    config: &MetastoreConfig,
) -> Result<String, failure::Error> {
    let output = migrator.run_schema_tool(&Invocation::info(config.db_kind))?;

    let target = SchemaTarget::for_version(config.hive_version.as_str());
    if target != SchemaTarget::V3_1_0 {
        info!(
            "schematool 3.1.0 may report a version mismatch for a {} schema; that is expected",
            target
        );
    }

    Ok(output)
}

#[cfg(test)]
mod test {
    use super::*;

    use crate::common::testing::{config, FakeHost};

    #[test]
    fn version_mapping() {
        assert_eq!(SchemaTarget::for_version("2.2.0"), SchemaTarget::V2_2_0);
        assert_eq!(SchemaTarget::for_version("2.2.9"), SchemaTarget::V2_2_0);
        assert_eq!(SchemaTarget::for_version("2.3.7"), SchemaTarget::V2_3_0);
        assert_eq!(SchemaTarget::for_version("2.3"), SchemaTarget::V2_3_0);
        assert_eq!(SchemaTarget::for_version("3.1.0"), SchemaTarget::V3_1_0);
        assert_eq!(SchemaTarget::for_version("3.1.2"), SchemaTarget::V3_1_0);
        assert_eq!(SchemaTarget::for_version("2.1.1"), SchemaTarget::V3_1_0);
        assert_eq!(SchemaTarget::for_version("1.2.1"), SchemaTarget::V3_1_0);

        for malformed in &["", "garbage", ".2.3", "x2.2", "22.3"] {
            assert_eq!(
                SchemaTarget::for_version(malformed),
                SchemaTarget::V3_1_0,
                "{:?}",
                malformed
            );
        }
    }

    #[test]
    fn invocation_args() {
        let args = Invocation::init(DbKind::Postgres, SchemaTarget::V2_3_0, true)
            .args()
            .join(" ");
        assert_eq!(
            args,
            "-dbType postgres -url \"$JDBCURL\" -userName \"$SQLUSER\" -passWord \"$SQLPASSWD\" \
             -driver \"$JDBCDRIVER\" -initSchemaTo 2.3.0 -ifNotExists -dryRun --verbose"
        );

        let args = Invocation::init(DbKind::Mssql, SchemaTarget::V3_1_0, false).args();
        assert!(!args.contains(&"-dryRun".to_string()));
        assert!(args.contains(&"-ifNotExists".to_string()));

        let args = Invocation::info(DbKind::Mysql).args();
        assert_eq!(args.last().map(String::as_str), Some("-info"));
        assert!(!args.contains(&"-initSchemaTo".to_string()));
    }

    #[test]
    fn skipped_when_not_requested() {
        let host = FakeHost::default();
        let mut config = config("postgres", "2.3.7");
        config.init_schema = InitFlag::No;

        assert_eq!(initialize(&host, &config).unwrap(), InitOutcome::Skipped);
        assert!(host.events.borrow().is_empty());
    }

    #[test]
    fn dry_run_gates_real_run() {
        let host = FakeHost::default();
        let outcome = initialize(&host, &config("mysql", "2.2.0")).unwrap();

        assert_eq!(outcome, InitOutcome::Initialized(SchemaTarget::V2_2_0));
        assert_eq!(
            *host.events.borrow(),
            vec![
                "schematool init 2.2.0 dry_run=true".to_string(),
                "schematool init 2.2.0 dry_run=false".to_string(),
            ]
        );
    }

    #[test]
    fn failed_dry_run_stops() {
        let host = FakeHost {
            fail_on: Some("schematool init 3.1.0 dry_run=true".into()),
            ..FakeHost::default()
        };

        let err = initialize(&host, &config("mssql", "3.1.0")).unwrap_err();
        match err.downcast_ref::<SetupError>() {
            Some(SetupError::DryRunFailed { target }) => assert_eq!(target, "3.1.0"),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(host.events.borrow().len(), 1);
    }

    #[test]
    fn verify_runs_info() {
        let host = FakeHost::default();
        verify(&host, &config("postgres", "2.3.7")).unwrap();
        assert_eq!(*host.events.borrow(), vec!["schematool info".to_string()]);
    }
}
