//! Initialize the metastore schema on its own, regardless of `--initmetastore`. This is for
//! retrying after a failed or skipped initialization.
//!
//! Requires `setup`, which installs schematool on the setup host.

use clap::clap_app;

use console::style;

use crate::common::{
    config::{param_args, InitFlag, MetastoreConfig, Params},
    env,
    remote::{check_reachable, FileStore, ReachabilityProbe, RemoteHost},
    remote_args,
    schema::{self, InitOutcome, SchemaMigrator},
    secret_store,
    secrets::Credentials,
    Login, Options,
};

pub fn cli_options() -> clap::App<'static, 'static> {
    let app = clap_app! { initschema =>
        (about: "Initializes the metastore schema with schematool, dry run first. Requires \
                 `setup`.")
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

    let outcome = init_schema(&host, config, &credentials, &options)?;

    if let InitOutcome::Initialized(target) = outcome {
        println!(
            "{}",
            style(format!("Metastore schema initialized to {}", target))
                .green()
                .bold()
        );
    }

    Ok(())
}

fn init_schema<H>(
    host: &H,
    config: MetastoreConfig,
    credentials: &Credentials,
    options: &Options<'_>,
) -> Result<InitOutcome, failure::Error>
where
    H: FileStore + ReachabilityProbe + SchemaMigrator,
{
    let config = MetastoreConfig {
        init_schema: InitFlag::Yes,
        ..config
    };

    check_reachable(host, &config, options.skip_probe)?;

    env::with_snapshot(host, &config, credentials, options.keep_env, || {
        schema::initialize(host, &config)
    })
}

#[cfg(test)]
mod test {
    use super::*;

    use crate::common::{
        schema::SchemaTarget,
        testing::{config, FakeHost},
    };

    #[test]
    fn ignores_init_flag() {
        let host = FakeHost::default();
        let mut config = config("postgres", "3.1.2");
        config.init_schema = InitFlag::No;
        let credentials = Credentials {
            user: "hive".into(),
            password: "hunter2".into(),
        };

        let outcome = init_schema(&host, config, &credentials, &Options::default()).unwrap();

        assert_eq!(outcome, InitOutcome::Initialized(SchemaTarget::V3_1_0));
        assert_eq!(
            *host.events.borrow(),
            vec![
                "probe pg.example.com:5432".to_string(),
                "put /tmp/msenv.sh 600".to_string(),
                "schematool init 3.1.0 dry_run=true".to_string(),
                "schematool init 3.1.0 dry_run=false".to_string(),
                "remove /tmp/msenv.sh".to_string(),
            ]
        );
    }
}
