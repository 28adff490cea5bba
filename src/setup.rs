//! Set up an external Hive metastore: check that the database is reachable from the setup host,
//! download the Hive and Hadoop runtimes and the JDBC driver, stage the metastore jars in durable
//! storage, write the cluster init script, and initialize the schema if asked to.
//!
//! The setup host must be able to reach the database and must have durable storage mounted.

use clap::clap_app;

use console::style;

use log::info;

use crate::common::{
    config::{param_args, MetastoreConfig, Params},
    env,
    hive::{self, ArtifactFetcher},
    location_args,
    remote::{check_reachable, FileStore, ReachabilityProbe, RemoteHost},
    remote_args,
    schema::{self, InitOutcome, SchemaMigrator},
    script::{self, SetupSummary},
    secret_store,
    secrets::Credentials,
    timings_str, Login, Options,
};

pub fn cli_options() -> clap::App<'static, 'static> {
    let app = clap_app! { setup =>
        (about: "Sets up an external Hive metastore from the given setup host: downloads the \
                 metastore jars, writes the cluster init script and optionally initializes the \
                 metastore schema.")
    };

    param_args(location_args(remote_args(app)))
}

pub fn run(dry_run: bool, sub_m: &clap::ArgMatches<'_>) -> Result<(), failure::Error> {
    let login = Login::from_matches(sub_m)?;
    let options = Options::from_matches(sub_m)?;

    let params = Params::from_matches(sub_m)?;
    let config = MetastoreConfig::from_params(&params, options.lenient_dbtype)?;

    let store = secret_store(sub_m)?;
    let credentials = Credentials::resolve(&config, store.as_ref())?;

    let host = RemoteHost::connect(&login, dry_run)?;

    let report = run_pipeline(&host, &config, &credentials, &options)?;

    if let InitOutcome::Initialized(target) = report.schema {
        println!(
            "{}",
            style(format!("Metastore schema initialized to {}", target)).green()
        );
    }

    println!("{}", style("== DONE ==").green().bold());
    println!(
        "{}",
        SetupSummary::new(&config, options.storage_root, &report.script_path)
    );

    Ok(())
}

/// What `run_pipeline` did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Report {
    /// Where the init script was written.
    pub script_path: String,
    pub schema: InitOutcome,
}

/// Run the whole setup against `host`.
///
/// Nothing is written if the database is unreachable. Once written, the environment snapshot is
/// removed at the end whether or not the later steps succeeded, unless `options.keep_env`.
pub fn run_pipeline<H>(
    host: &H,
    config: &MetastoreConfig,
    credentials: &Credentials,
    options: &Options<'_>,
) -> Result<Report, failure::Error>
where
    H: ArtifactFetcher + FileStore + ReachabilityProbe + SchemaMigrator,
{
    check_reachable(host, config, options.skip_probe)?;

    env::with_snapshot(host, config, credentials, options.keep_env, || {
        let mut timers = vec![];

        let plan = hive::plan_downloads(config, options.storage_root);
        time!(timers, "Artifacts", hive::acquire(host, &plan))?;

        let script_path = time!(
            timers,
            "Init script",
            script::publish(host, config, options.storage_root, options.scripts_dir)
        )?;

        let schema = time!(timers, "Schema", schema::initialize(host, config))?;

        info!("Timings:\n{}", timings_str(&timers));

        Ok(Report {
            script_path,
            schema,
        })
    })
}
