//! Print the schema version schematool finds in the metastore database.
//!
//! Requires `setup`.

use clap::clap_app;

use crate::common::{
    config::{param_args, MetastoreConfig, Params},
    env,
    remote::{check_reachable, FileStore, ReachabilityProbe, RemoteHost},
    remote_args,
    schema::{self, SchemaMigrator},
    secret_store,
    secrets::Credentials,
    Login, Options,
};

pub fn cli_options() -> clap::App<'static, 'static> {
    let app = clap_app! { verify =>
        (about: "Prints the metastore schema version using schematool -info. Requires `setup`.")
    };

    param_args(remote_args(app))
}

pub fn run(dry_run: bool, sub_m: &clap::ArgMatches<'_>) -> Result<(), failure::Error> {
    let login = Login::from_matches(sub_m)?;
    let options = Options::from_matches(sub_m)?;

    let params = Params::from_matches(sub_m)?;
    let config = MetastoreConfig::from_params(&params, options.lenient_dbtype)?;

    let store = secret_store(sub_m)?;
    let credentials = Credentials::resolve(&config, store.as_ref())?;

    let host = RemoteHost::connect(&login, dry_run)?;

    let output = schema_info(&host, &config, &credentials, &options)?;

    println!("{}", output);

    Ok(())
}

fn schema_info<H>(
    host: &H,
    config: &MetastoreConfig,
    credentials: &Credentials,
    options: &Options<'_>,
) -> Result<String, failure::Error>
where
    H: FileStore + ReachabilityProbe + SchemaMigrator,
{
    check_reachable(host, config, options.skip_probe)?;

    env::with_snapshot(host, config, credentials, options.keep_env, || {
        schema::verify(host, config)
    })
}

#[cfg(test)]
mod test {
    use super::*;

    use crate::common::{
        env::ENV_FILE,
        testing::{config, FakeHost},
    };

    fn credentials() -> Credentials {
        Credentials {
            user: "hive".into(),
            password: "hunter2".into(),
        }
    }

    #[test]
    fn info_runs_inside_snapshot() {
        let host = FakeHost::default();

        let output = schema_info(
            &host,
            &config("mssql", "2.3.7"),
            &credentials(),
            &Options::default(),
        )
        .unwrap();

        assert_eq!(output, "schemaTool completed");
        assert_eq!(
            *host.events.borrow(),
            vec![
                "probe pg.example.com:5432".to_string(),
                "put /tmp/msenv.sh 600".to_string(),
                "schematool info".to_string(),
                "remove /tmp/msenv.sh".to_string(),
            ]
        );
        assert!(host.files.borrow().is_empty());
    }

    #[test]
    fn failed_info_still_removes_snapshot() {
        let host = FakeHost {
            fail_on: Some("schematool info".into()),
            ..FakeHost::default()
        };
        let options = Options {
            skip_probe: true,
            ..Options::default()
        };

        assert!(schema_info(&host, &config("mysql", "3.1.0"), &credentials(), &options).is_err());

        let events = host.events.borrow();
        assert_eq!(events.first().map(String::as_str), Some("put /tmp/msenv.sh 600"));
        assert_eq!(events.last().map(String::as_str), Some("remove /tmp/msenv.sh"));
        assert!(!host.files.borrow().contains_key(ENV_FILE));
    }
}
