//! Print the cluster init script (and optionally the setup summary) for the given parameters
//! without connecting to anything. No credentials are needed, since the script expands them on
//! the cluster.

use clap::clap_app;

use log::info;

use crate::common::{
    config::{param_args, MetastoreConfig, Params},
    location_args,
    script::{self, InitScript, SetupSummary},
    Options,
};

pub fn cli_options() -> clap::App<'static, 'static> {
    let app = clap_app! { render =>
        (about: "Prints the cluster init script for the given parameters without connecting to \
                 the setup host.")
        (@arg OUTPUT: -o --output +takes_value
         "(Optional) write the script to this local file instead of printing it")
        (@arg SUMMARY: --summary
         "Also print the cluster environment variables and the equivalent Spark config")
        (@arg LENIENT_DBTYPE: --lenient_dbtype
         "Fall back to mssql for an unrecognized --dbtype instead of failing.")
    };

    param_args(location_args(app))
}

pub fn run(sub_m: &clap::ArgMatches<'_>) -> Result<(), failure::Error> {
    let options = Options::from_matches(sub_m)?;

    let params = Params::from_matches(sub_m)?;
    let config = MetastoreConfig::from_params(&params, options.lenient_dbtype)?;

    let (contents, script_path) = render(&config, &options)?;

    match sub_m.value_of("OUTPUT") {
        Some(path) => {
            std::fs::write(path, &contents)?;
            info!("Wrote {} (publish it as {})", path, script_path);
        }
        None => print!("{}", contents),
    }

    if sub_m.is_present("SUMMARY") {
        println!();
        println!(
            "{}",
            SetupSummary::new(&config, options.storage_root, &script_path)
        );
    }

    Ok(())
}

/// The init script and the path `setup` would publish it at.
fn render(
    config: &MetastoreConfig,
    options: &Options<'_>,
) -> Result<(String, String), failure::Error> {
    let contents = InitScript::new(config, options.storage_root).render()?;
    let script_path = script::script_path(options.scripts_dir, config);

    Ok((contents, script_path))
}

#[cfg(test)]
mod test {
    use super::*;

    use crate::common::testing::{config, FakeHost};

    #[test]
    fn matches_published_script() {
        let config = config("mysql", "2.3.7");
        let options = Options::default();

        let (contents, script_path) = render(&config, &options).unwrap();

        let host = FakeHost::default();
        let published = script::publish(
            &host,
            &config,
            options.storage_root,
            options.scripts_dir,
        )
        .unwrap();

        assert_eq!(published, script_path);
        assert_eq!(host.files.borrow()[&published].0, contents);
    }

    #[test]
    fn cli_parses_params() {
        let matches = cli_options().get_matches_from(vec![
            "render",
            "--dbtype",
            "postgres",
            "--dbhost",
            "pg.example.com",
            "--dbport",
            "5432",
            "--jdbcurl",
            "jdbc:postgresql://pg.example.com:5432/metastore",
            "--secretscope",
            "metastore",
            "--storage_root",
            "/mnt/storage",
        ]);

        let options = Options::from_matches(&matches).unwrap();
        let params = Params::from_matches(&matches).unwrap();
        let config = MetastoreConfig::from_params(&params, options.lenient_dbtype).unwrap();

        let (contents, script_path) = render(&config, &options).unwrap();
        assert_eq!(
            script_path,
            "/dbfs/databricks/scripts/external-metastore-237.sh"
        );
        assert!(contents.contains("/mnt/storage/metastore_jars_2.3.7/*"));
        assert!(contents.contains("org.postgresql.Driver"));
    }
}
