//! A library of routines shared by the setup subcommands.

#[macro_use]
mod macros;

pub mod config;
pub mod env;
pub mod error;
pub mod hive;
pub mod remote;
pub mod schema;
pub mod script;
pub mod secrets;

#[cfg(test)]
pub mod testing;

use std::time::Duration;

use self::script::{DEFAULT_SCRIPTS_DIR, DEFAULT_STORAGE_ROOT};
use self::secrets::{EnvSecretStore, FileSecretStore, SecretStore};

/// The SSH port used when the setup host is given without one.
pub const DEFAULT_SSH_PORT: u16 = 22;

#[derive(Copy, Clone, Debug)]
pub struct Username<'u>(pub &'u str);

impl Username<'_> {
    pub fn as_str(&self) -> &str {
        self.0
    }
}

/// How to reach the setup host.
#[derive(Copy, Clone, Debug)]
pub struct Login<'u, 'h> {
    pub username: Username<'u>,
    pub hostname: &'h str,
    pub port: u16,
}

impl<'u, 'h> Login<'u, 'h> {
    /// `host` is `hostname` or `hostname:port`. IPv6 literals go in brackets (`[fe80::1]:2200`)
    /// and keep them in `hostname`.
    pub fn new(username: &'u str, host: &'h str) -> Result<Self, failure::Error> {
        let split = if host.starts_with('[') {
            match host.find(']') {
                Some(end) if end + 1 == host.len() => (host, None),
                Some(end) if host[end + 1..].starts_with(':') => {
                    (&host[..=end], Some(&host[end + 2..]))
                }
                _ => failure::bail!("invalid IPv6 setup host `{}`", host),
            }
        } else {
            match host.rfind(':') {
                Some(i) => (&host[..i], Some(&host[i + 1..])),
                None => (host, None),
            }
        };

        let (hostname, port) = match split {
            (hostname, Some(port)) => match port.parse::<u16>() {
                Ok(port) => (hostname, port),
                Err(_) => failure::bail!("invalid port in setup host `{}`", host),
            },
            (hostname, None) => (hostname, DEFAULT_SSH_PORT),
        };

        if hostname.is_empty() || hostname == "[]" {
            failure::bail!("missing hostname in setup host `{}`", host);
        }

        Ok(Login {
            username: Username(username),
            hostname,
            port,
        })
    }

    /// `hostname:port`.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.hostname, self.port)
    }
}

impl<'a> Login<'a, 'a> {
    /// Read the login from the arguments added by `remote_args`.
    pub fn from_matches(sub_m: &'a clap::ArgMatches<'_>) -> Result<Self, failure::Error> {
        Login::new(
            sub_m.value_of("USERNAME").unwrap(),
            sub_m.value_of("HOSTNAME").unwrap(),
        )
    }
}

/// Quote `s` as a single word for a POSIX shell.
pub fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "'\\''"))
}

/// Add the arguments common to every subcommand that talks to the setup host.
pub fn remote_args(app: clap::App<'static, 'static>) -> clap::App<'static, 'static> {
    app.arg(
        clap::Arg::with_name("HOSTNAME")
            .required(true)
            .takes_value(true)
            .help(
                "The setup host, a node in the cluster network with the durable storage \
                 mounted (e.g. 10.139.64.4:2200)",
            ),
    )
    .arg(
        clap::Arg::with_name("USERNAME")
            .required(true)
            .takes_value(true)
            .help(
                "The username on the setup host (e.g. ubuntu). It needs passwordless sudo to \
                 unpack the runtimes under /opt.",
            ),
    )
    .arg(
        clap::Arg::with_name("SECRETS")
            .long("secrets")
            .takes_value(true)
            .help(
                "A JSON file of the form {\"<scope>\": {\"<key>\": \"<value>\"}} holding the \
                 database credentials. Without it, credentials are read from \
                 METASTORE_SECRET_<SCOPE>_<KEY> environment variables.",
            ),
    )
    .arg(
        clap::Arg::with_name("LENIENT_DBTYPE")
            .long("lenient_dbtype")
            .help("Fall back to mssql for an unrecognized --dbtype instead of failing."),
    )
    .arg(
        clap::Arg::with_name("SKIP_PROBE")
            .long("skip_probe")
            .help("Do not check that the database is reachable from the setup host first."),
    )
    .arg(
        clap::Arg::with_name("KEEP_ENV")
            .long("keep_env")
            .help(
                "Keep the environment snapshot (which contains the credentials) on the setup \
                 host after the run.",
            ),
    )
}

/// Add the arguments that say where things go in durable storage.
pub fn location_args(app: clap::App<'static, 'static>) -> clap::App<'static, 'static> {
    app.arg(
        clap::Arg::with_name("STORAGE_ROOT")
            .long("storage_root")
            .takes_value(true)
            .help("Where durable storage is mounted on the setup host (default /dbfs/databricks)"),
    )
    .arg(
        clap::Arg::with_name("SCRIPTS_DIR")
            .long("scripts_dir")
            .takes_value(true)
            .help("Where to write the init script (default /dbfs/databricks/scripts)"),
    )
}

/// Flags shared by the subcommands. Any that a subcommand does not take keep their defaults.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Options<'a> {
    pub storage_root: &'a str,
    pub scripts_dir: &'a str,
    pub skip_probe: bool,
    pub keep_env: bool,
    pub lenient_dbtype: bool,
}

impl Default for Options<'static> {
    fn default() -> Self {
        Options {
            storage_root: DEFAULT_STORAGE_ROOT,
            scripts_dir: DEFAULT_SCRIPTS_DIR,
            skip_probe: false,
            keep_env: false,
            lenient_dbtype: false,
        }
    }
}

impl<'a> Options<'a> {
    pub fn from_matches(sub_m: &'a clap::ArgMatches<'_>) -> Result<Self, failure::Error> {
        let defaults = Options::default();

        let options = Options {
            storage_root: sub_m
                .value_of("STORAGE_ROOT")
                .unwrap_or(defaults.storage_root),
            scripts_dir: sub_m.value_of("SCRIPTS_DIR").unwrap_or(defaults.scripts_dir),
            skip_probe: sub_m.is_present("SKIP_PROBE"),
            keep_env: sub_m.is_present("KEEP_ENV"),
            lenient_dbtype: sub_m.is_present("LENIENT_DBTYPE"),
        };

        check_dir("storage_root", options.storage_root)?;
        check_dir("scripts_dir", options.scripts_dir)?;

        Ok(options)
    }
}

/// Directories end up unquoted in remote commands and in the init script.
fn check_dir(field: &'static str, value: &str) -> Result<(), failure::Error> {
    let ok = value.starts_with('/')
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "._-/".contains(c));

    if !ok {
        return Err(error::SetupError::InvalidValue {
            field,
            value: value.into(),
            reason: "must be an absolute path made of letters, digits, '.', '_', '-' and '/'",
        }
        .into());
    }

    Ok(())
}

/// Format the collected timings, one per line.
pub fn timings_str(timers: &[(&str, Duration)]) -> String {
    timers
        .iter()
        .map(|(label, duration)| format!("{}: {:.1}s", label, duration.as_secs_f64()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// The secret store selected by the arguments added by `remote_args`.
pub fn secret_store(sub_m: &clap::ArgMatches<'_>) -> Result<Box<dyn SecretStore>, failure::Error> {
    Ok(match sub_m.value_of("SECRETS") {
        Some(path) => Box::new(FileSecretStore::open(&path)?),
        None => Box::new(EnvSecretStore),
    })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn login_host_and_port() {
        let login = Login::new("ubuntu", "10.0.0.4:2200").unwrap();
        assert_eq!(login.hostname, "10.0.0.4");
        assert_eq!(login.port, 2200);
        assert_eq!(login.addr(), "10.0.0.4:2200");

        let login = Login::new("ubuntu", "setup.example.com").unwrap();
        assert_eq!(login.port, DEFAULT_SSH_PORT);
        assert_eq!(login.addr(), "setup.example.com:22");

        assert!(Login::new("ubuntu", "host:ssh").is_err());
        assert!(Login::new("ubuntu", ":22").is_err());
    }

    #[test]
    fn login_ipv6() {
        let login = Login::new("ubuntu", "[::1]").unwrap();
        assert_eq!(login.hostname, "[::1]");
        assert_eq!(login.port, DEFAULT_SSH_PORT);
        assert_eq!(login.addr(), "[::1]:22");

        let login = Login::new("ubuntu", "[fe80::1]:2200").unwrap();
        assert_eq!(login.hostname, "[fe80::1]");
        assert_eq!(login.port, 2200);

        assert!(Login::new("ubuntu", "[::1").is_err());
        assert!(Login::new("ubuntu", "[::1]22").is_err());
        assert!(Login::new("ubuntu", "[::1]:ssh").is_err());
        assert!(Login::new("ubuntu", "[]:22").is_err());
    }

    #[test]
    fn dirs_are_checked() {
        assert!(check_dir("storage_root", "/dbfs/databricks").is_ok());
        assert!(check_dir("storage_root", "/mnt/my-storage_1.0/").is_ok());
        assert!(check_dir("storage_root", "dbfs/databricks").is_err());
        assert!(check_dir("storage_root", "/dbfs/data bricks").is_err());
        assert!(check_dir("scripts_dir", "/tmp/$(id)").is_err());
    }

    #[test]
    fn options_defaults() {
        let matches = location_args(clap::App::new("test")).get_matches_from(vec!["test"]);
        assert_eq!(Options::from_matches(&matches).unwrap(), Options::default());

        let matches = location_args(clap::App::new("test")).get_matches_from(vec![
            "test",
            "--storage_root",
            "/mnt/storage",
        ]);
        let options = Options::from_matches(&matches).unwrap();
        assert_eq!(options.storage_root, "/mnt/storage");
        assert_eq!(options.scripts_dir, DEFAULT_SCRIPTS_DIR);
    }

    #[test]
    fn timings() {
        let timers = vec![
            ("Download", Duration::from_millis(1500)),
            ("Schema", Duration::from_secs(2)),
        ];
        assert_eq!(timings_str(&timers), "Download: 1.5s\nSchema: 2.0s");
    }

    #[test]
    fn quoting() {
        assert_eq!(shell_quote("plain"), "'plain'");
        assert_eq!(shell_quote("it's"), "'it'\\''s'");
        assert_eq!(shell_quote("$HOME `id`"), "'$HOME `id`'");
    }
}
