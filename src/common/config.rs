//! Parameter intake and the resolved metastore configuration.
//!
//! Parameters arrive as strings, either from a JSON file using the same keys as the setup
//! notebook's widgets or from individual command line flags (flags win). `MetastoreConfig` is the
//! validated form that the rest of the pipeline consumes. It is built once per run and passed
//! around by reference; nothing mutates it afterwards.

use std::path::Path;
use std::str::FromStr;

use log::{info, warn};

use serde::{Deserialize, Serialize};

use super::error::SetupError;

/// The Hive version whose runtime and schematool are always downloaded.
pub const DEFAULT_HIVE_VERSION: &str = "3.1.0";

/// The database products that can hold the metastore.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DbKind {
    /// SQL Server / Azure SQL.
    Mssql,
    /// MySQL, accessed through the MariaDB driver.
    Mysql,
    Postgres,
}

impl DbKind {
    /// The fully qualified JDBC driver class.
    pub fn driver_class(self) -> &'static str {
        match self {
            DbKind::Mssql => "com.microsoft.sqlserver.jdbc.SQLServerDriver",
            DbKind::Mysql => "org.mariadb.jdbc.Driver",
            DbKind::Postgres => "org.postgresql.Driver",
        }
    }

    /// The value schematool expects for `-dbType`.
    pub fn schema_tool_name(self) -> &'static str {
        match self {
            DbKind::Mssql => "mssql",
            DbKind::Mysql => "mysql",
            DbKind::Postgres => "postgres",
        }
    }

    /// Select by the exact lowercase names `mssql`, `mysql` and `postgres`, falling back to
    /// `Mssql` for anything else (including other spellings like `MySql`). Only for
    /// `--lenient_dbtype`; use `FromStr` otherwise.
    pub fn from_str_or_default(s: &str) -> DbKind {
        DbKind::exact(s).unwrap_or_else(|| {
            warn!(
                "Unrecognized database type {:?}, falling back to {}",
                s,
                DbKind::Mssql
            );
            DbKind::Mssql
        })
    }

    fn exact(s: &str) -> Option<DbKind> {
        match s {
            "mssql" => Some(DbKind::Mssql),
            "mysql" => Some(DbKind::Mysql),
            "postgres" => Some(DbKind::Postgres),
            _ => None,
        }
    }
}

impl FromStr for DbKind {
    type Err = SetupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mssql" => Ok(DbKind::Mssql),
            "mysql" => Ok(DbKind::Mysql),
            "postgres" => Ok(DbKind::Postgres),
            _ => Err(SetupError::UnknownDbKind(s.into())),
        }
    }
}

impl std::fmt::Display for DbKind {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.schema_tool_name())
    }
}

/// Map a database type string to a driver class. Anything but the exact names `mssql`, `mysql`
/// and `postgres` gets the SQL Server driver.
pub fn driver_class_for(dbtype: &str) -> &'static str {
    DbKind::exact(dbtype).unwrap_or(DbKind::Mssql).driver_class()
}

/// Check that `value` is non-empty and only contains characters accepted by `allowed`.
fn check_chars(
    field: &'static str,
    value: &str,
    allowed: impl Fn(char) -> bool,
) -> Result<(), SetupError> {
    if value.is_empty() {
        Err(SetupError::InvalidValue {
            field,
            value: value.into(),
            reason: "must not be empty",
        })
    } else if !value.chars().all(allowed) {
        Err(SetupError::InvalidValue {
            field,
            value: value.into(),
            reason: "contains characters that are not allowed",
        })
    } else {
        Ok(())
    }
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_'
}

/// A Hive version string such as `2.3.7`. It ends up in download URLs, file names and shell
/// commands, so only `[A-Za-z0-9._-]` is accepted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HiveVersion(String);

impl HiveVersion {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The version with all dots removed (`2.3.7` becomes `237`). Only used for naming.
    pub fn clean(&self) -> String {
        self.0.replace('.', "")
    }

    /// Is this the version that is always downloaded anyway?
    pub fn is_default_build(&self) -> bool {
        self.0 == DEFAULT_HIVE_VERSION
    }
}

impl FromStr for HiveVersion {
    type Err = SetupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        check_chars("hiveversion", s, is_name_char)?;

        if s.split('.').count() != 3 {
            warn!("Hive version {:?} is not in X.X.X format", s);
        }

        Ok(HiveVersion(s.into()))
    }
}

impl std::fmt::Display for HiveVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where the metastore jars are stored, relative to the durable storage root (e.g.
/// `metastore_jars_237`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JarPath(String);

impl JarPath {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for JarPath {
    type Err = SetupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim_end_matches('/');
        check_chars("metastorejarpath", s, |c| is_name_char(c) || c == '/')?;

        if s.starts_with('/') || s.split('/').any(|part| part.is_empty() || part == "..") {
            return Err(SetupError::InvalidValue {
                field: "metastorejarpath",
                value: s.into(),
                reason: "must be a relative path without empty or `..` components",
            });
        }

        Ok(JarPath(s.into()))
    }
}

/// Whether to initialize the metastore schema.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum InitFlag {
    Yes,
    No,
}

impl FromStr for InitFlag {
    type Err = SetupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "yes" | "true" => Ok(InitFlag::Yes),
            "no" | "false" => Ok(InitFlag::No),
            _ => Err(SetupError::InvalidInitFlag(s.into())),
        }
    }
}

impl std::fmt::Display for InitFlag {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            InitFlag::Yes => write!(f, "Yes"),
            InitFlag::No => write!(f, "No"),
        }
    }
}

/// The raw setup parameters. Field names match the notebook widgets so that an existing parameter
/// JSON document can be reused as is.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Params {
    pub dbhost: String,
    pub dbport: String,
    pub jdbcurl: String,
    pub secretscope: String,
    pub dbuser_secretname: String,
    pub dbpassword_secretname: String,
    pub hiveversion: String,
    pub metastorejarpath: String,
    pub initmetastore: String,
    pub dbtype: String,
}

impl Default for Params {
    fn default() -> Self {
        Params {
            dbhost: String::new(),
            dbport: "1433".into(),
            jdbcurl: String::new(),
            secretscope: String::new(),
            dbuser_secretname: "dbuser".into(),
            dbpassword_secretname: "dbpassword".into(),
            hiveversion: "2.3.7".into(),
            metastorejarpath: "metastore_jars_2.3.7".into(),
            initmetastore: "Yes".into(),
            dbtype: "mssql".into(),
        }
    }
}

/// Command line flags for each parameter, with their help text.
const PARAM_FLAGS: &[(&str, &str)] = &[
    ("dbhost", "The host of the metastore database"),
    ("dbport", "The port of the metastore database (default 1433)"),
    (
        "jdbcurl",
        "The JDBC URL of the metastore database (e.g. \
         jdbc:postgresql://pg.example.com:5432/metastore)",
    ),
    ("secretscope", "The secret scope holding the database credentials"),
    (
        "dbuser_secretname",
        "The key of the database user in the secret scope (default dbuser)",
    ),
    (
        "dbpassword_secretname",
        "The key of the database password in the secret scope (default dbpassword)",
    ),
    ("hiveversion", "The metastore Hive version in X.X.X format (default 2.3.7)"),
    (
        "metastorejarpath",
        "The path under the storage root to store the Hive jars in (default metastore_jars_2.3.7)",
    ),
    (
        "initmetastore",
        "Yes to initialize the metastore schema with schematool (default Yes)",
    ),
    ("dbtype", "mssql (Azure SQL), mysql or postgres (default mssql)"),
];

/// Add the `--params FILE` option and one flag per parameter to `app`.
pub fn param_args(app: clap::App<'static, 'static>) -> clap::App<'static, 'static> {
    let app = app.arg(
        clap::Arg::with_name("PARAMS")
            .long("params")
            .takes_value(true)
            .help(
                "A JSON file with the setup parameters, using the flag names as keys. \
                 Individual flags override values from the file.",
            ),
    );

    PARAM_FLAGS.iter().fold(app, |app, &(name, help)| {
        app.arg(
            clap::Arg::with_name(name)
                .long(name)
                .takes_value(true)
                .help(help),
        )
    })
}

impl Params {
    /// Read parameters from a JSON document. Missing keys take their default values.
    pub fn from_json_file<P: AsRef<Path>>(path: &P) -> Result<Self, failure::Error> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Build parameters from the arguments added by `param_args`.
    pub fn from_matches(sub_m: &clap::ArgMatches<'_>) -> Result<Self, failure::Error> {
        let mut params = match sub_m.value_of("PARAMS") {
            Some(path) => Params::from_json_file(&path)?,
            None => Params::default(),
        };

        for &(name, _) in PARAM_FLAGS.iter() {
            if let Some(value) = sub_m.value_of(name) {
                params.set(name, value.into());
            }
        }

        Ok(params)
    }

    fn set(&mut self, name: &str, value: String) {
        let field = match name {
            "dbhost" => &mut self.dbhost,
            "dbport" => &mut self.dbport,
            "jdbcurl" => &mut self.jdbcurl,
            "secretscope" => &mut self.secretscope,
            "dbuser_secretname" => &mut self.dbuser_secretname,
            "dbpassword_secretname" => &mut self.dbpassword_secretname,
            "hiveversion" => &mut self.hiveversion,
            "metastorejarpath" => &mut self.metastorejarpath,
            "initmetastore" => &mut self.initmetastore,
            "dbtype" => &mut self.dbtype,
            _ => unreachable!("unknown parameter {}", name),
        };

        *field = value;
    }
}

/// The validated, non-secret metastore configuration. Credentials are resolved separately (see
/// `secrets::Credentials`) so that this can be printed and rendered without a secret store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MetastoreConfig {
    pub db_host: String,
    pub db_port: u16,
    pub jdbc_url: String,
    pub db_kind: DbKind,
    pub hive_version: HiveVersion,
    pub jar_path: JarPath,
    pub init_schema: InitFlag,
    pub secret_scope: String,
    pub user_secret_key: String,
    pub password_secret_key: String,
}

impl MetastoreConfig {
    /// Validate `params`. With `lenient_dbtype`, an unrecognized database type selects SQL Server
    /// instead of failing.
    pub fn from_params(params: &Params, lenient_dbtype: bool) -> Result<Self, failure::Error> {
        check_chars("dbhost", &params.dbhost, |c| {
            is_name_char(c) || c == ':' || c == '[' || c == ']'
        })?;

        let db_port = params
            .dbport
            .trim()
            .parse::<u16>()
            .map_err(|_| SetupError::InvalidValue {
                field: "dbport",
                value: params.dbport.clone(),
                reason: "must be a port number",
            })?;

        if !params.jdbcurl.starts_with("jdbc:") {
            return Err(SetupError::InvalidValue {
                field: "jdbcurl",
                value: params.jdbcurl.clone(),
                reason: "must start with `jdbc:`",
            }
            .into());
        }

        let db_kind = if lenient_dbtype {
            let kind = DbKind::from_str_or_default(&params.dbtype);
            info!(
                "Database type {:?} selects driver {}",
                params.dbtype,
                driver_class_for(&params.dbtype)
            );
            kind
        } else {
            params.dbtype.parse()?
        };

        for &(field, value) in &[
            ("secretscope", &params.secretscope),
            ("dbuser_secretname", &params.dbuser_secretname),
            ("dbpassword_secretname", &params.dbpassword_secretname),
        ] {
            if value.trim().is_empty() {
                return Err(SetupError::InvalidValue {
                    field,
                    value: value.clone(),
                    reason: "must not be empty",
                }
                .into());
            }
        }

        Ok(MetastoreConfig {
            db_host: params.dbhost.clone(),
            db_port,
            jdbc_url: params.jdbcurl.clone(),
            db_kind,
            hive_version: params.hiveversion.parse()?,
            jar_path: params.metastorejarpath.parse()?,
            init_schema: params.initmetastore.parse()?,
            secret_scope: params.secretscope.clone(),
            user_secret_key: params.dbuser_secretname.clone(),
            password_secret_key: params.dbpassword_secretname.clone(),
        })
    }

    pub fn driver_class(&self) -> &'static str {
        self.db_kind.driver_class()
    }

    pub fn clean_version(&self) -> String {
        self.hive_version.clean()
    }

    /// Does the requested version need its own runtime in addition to the default build?
    pub fn needs_version_specific_runtime(&self) -> bool {
        !self.hive_version.is_default_build()
    }
}
