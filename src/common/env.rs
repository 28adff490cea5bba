//! The environment snapshot: every resolved setting, secrets included, as a shell-sourceable
//! `KEY='value'` file on the setup host.
//!
//! The schematool steps source this file so that the credentials never show up in a command line
//! that gets echoed to the terminal. It lives in `/tmp` with mode `0600` and is removed at the end
//! of the run unless the operator asks to keep it.

use log::info;

use super::{
    config::MetastoreConfig, remote::FileStore, secrets::Credentials, shell_quote,
};

/// Where the snapshot is written on the setup host.
pub const ENV_FILE: &str = "/tmp/msenv.sh";

/// Render the snapshot. The output depends only on the inputs, in a fixed key order.
pub fn render(config: &MetastoreConfig, credentials: &Credentials) -> String {
    let port = config.db_port.to_string();
    let clean_version = config.clean_version();
    let init_schema = config.init_schema.to_string();

    let entries = [
        ("DBHOST", config.db_host.as_str()),
        ("DBPORT", port.as_str()),
        ("JDBCURL", config.jdbc_url.as_str()),
        ("JDBCDRIVER", config.driver_class()),
        ("SECRETSCOPE", config.secret_scope.as_str()),
        ("DBUSER_SECRETNAME", config.user_secret_key.as_str()),
        ("DBPASSWORD_SECRETNAME", config.password_secret_key.as_str()),
        ("HIVEVERSION", config.hive_version.as_str()),
        ("HIVEVERSIONCLEAN", clean_version.as_str()),
        ("METASTOREJARPATH", config.jar_path.as_str()),
        ("INITMETASTORE", init_schema.as_str()),
        ("DBTYPE", config.db_kind.schema_tool_name()),
        ("SQLUSER", credentials.user.as_str()),
        ("SQLPASSWD", credentials.password.as_str()),
    ];

    entries
        .iter()
        .map(|(key, value)| format!("{}={}\n", key, shell_quote(value)))
        .collect()
}

/// Write the snapshot to `ENV_FILE`, readable only by the setup user.
pub fn materialize<S: FileStore + ?Sized>(
    store: &S,
    config: &MetastoreConfig,
    credentials: &Credentials,
) -> Result<(), failure::Error> {
    store.put(ENV_FILE, &render(config, credentials), 0o600)?;
    info!("Wrote environment snapshot to {}", ENV_FILE);
    Ok(())
}

/// Materialize the snapshot, run `f`, then remove the snapshot again (unless `keep`), whether or
/// not `f` succeeded.
pub fn with_snapshot<S, T, F>(
    store: &S,
    config: &MetastoreConfig,
    credentials: &Credentials,
    keep: bool,
    f: F,
) -> Result<T, failure::Error>
where
    S: FileStore + ?Sized,
    F: FnOnce() -> Result<T, failure::Error>,
{
    materialize(store, config, credentials)?;

    let result = f();

    let cleanup = if keep {
        info!("Keeping environment snapshot {}", ENV_FILE);
        Ok(())
    } else {
        store.remove(ENV_FILE)
    };

    let value = result?;
    cleanup?;

    Ok(value)
}

#[cfg(test)]
mod test {
    use super::*;

    use crate::common::testing::{config, FakeHost};

    fn credentials() -> Credentials {
        Credentials {
            user: "hive".into(),
            password: "it's $ecret".into(),
        }
    }

    #[test]
    fn render_is_ordered_and_quoted() {
        let rendered = render(&config("postgres", "2.3.7"), &credentials());
        let lines: Vec<_> = rendered.lines().collect();

        assert_eq!(
            lines,
            vec![
                "DBHOST='pg.example.com'",
                "DBPORT='5432'",
                "JDBCURL='jdbc:postgresql://pg.example.com:5432/metastore'",
                "JDBCDRIVER='org.postgresql.Driver'",
                "SECRETSCOPE='metastore'",
                "DBUSER_SECRETNAME='dbuser'",
                "DBPASSWORD_SECRETNAME='dbpassword'",
                "HIVEVERSION='2.3.7'",
                "HIVEVERSIONCLEAN='237'",
                "METASTOREJARPATH='metastore_jars_2.3.7'",
                "INITMETASTORE='Yes'",
                "DBTYPE='postgres'",
                "SQLUSER='hive'",
                "SQLPASSWD='it'\\''s $ecret'",
            ]
        );
        assert!(rendered.ends_with('\n'));
    }

    #[test]
    fn render_is_deterministic() {
        let config = config("mssql", "3.1.0");
        assert_eq!(
            render(&config, &credentials()),
            render(&config, &credentials())
        );
    }

    #[test]
    fn materialize_writes_private_file() {
        let host = FakeHost::default();
        materialize(&host, &config("mysql", "2.3.7"), &credentials()).unwrap();

        let files = host.files.borrow();
        let (contents, mode) = &files[ENV_FILE];
        assert_eq!(*mode, 0o600);
        assert!(contents.contains("JDBCDRIVER='org.mariadb.jdbc.Driver'\n"));
    }

    #[test]
    fn snapshot_is_removed_even_on_failure() {
        let host = FakeHost::default();
        let config = config("postgres", "2.3.7");

        let result: Result<(), failure::Error> =
            with_snapshot(&host, &config, &credentials(), false, || {
                assert!(host.files.borrow().contains_key(ENV_FILE));
                Err(failure::format_err!("boom"))
            });

        assert!(result.is_err());
        assert!(!host.files.borrow().contains_key(ENV_FILE));
        assert_eq!(
            host.events.borrow().last().map(String::as_str),
            Some("remove /tmp/msenv.sh")
        );
    }

    #[test]
    fn snapshot_can_be_kept() {
        let host = FakeHost::default();
        let value = with_snapshot(
            &host,
            &config("postgres", "2.3.7"),
            &credentials(),
            true,
            || Ok(7),
        )
        .unwrap();

        assert_eq!(value, 7);
        assert!(host.files.borrow().contains_key(ENV_FILE));
    }
}
