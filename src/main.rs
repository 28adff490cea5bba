//! This program sets up an external Hive metastore for a cluster from a setup host inside the
//! cluster network. Which step is run is chosen by passing different subcommands.

// Useful common routines
#[macro_use]
mod common;

mod initschema;
mod render;
mod setup;
mod verify;

use crate::common::error::SetupError;

fn run() -> Result<(), failure::Error> {
    let matches = clap::App::new("metastore-setup")
        .about(
            "This program sets up an external Hive metastore for a cluster from a setup host \
             inside the cluster network. Which step is run is chosen by passing different \
             subcommands.",
        )
        .arg(
            clap::Arg::with_name("DRY")
                .short("d")
                .long("dry_run")
                .help("Don't actually execute commands. Just print what would run and exit."),
        )
        .subcommand(setup::cli_options())
        .subcommand(render::cli_options())
        .subcommand(initschema::cli_options())
        .subcommand(verify::cli_options())
        .setting(clap::AppSettings::SubcommandRequired)
        .setting(clap::AppSettings::DisableVersion)
        .get_matches();

    let dry_run = matches.is_present("DRY");

    match matches.subcommand() {
        ("setup", Some(sub_m)) => setup::run(dry_run, sub_m),
        ("render", Some(sub_m)) => render::run(sub_m),
        ("initschema", Some(sub_m)) => initschema::run(dry_run, sub_m),
        ("verify", Some(sub_m)) => verify::run(dry_run, sub_m),

        _ => {
            unreachable!();
        }
    }
}

fn main() {
    use console::style;

    env_logger::init();

    // Always collect backtraces; the cost does not matter next to the downloads.
    std::env::set_var("RUST_BACKTRACE", "1");

    // If an error occurred, try to print something helpful.
    if let Err(err) = run() {
        const MESSAGE: &str =
r#"== ERROR ==================================================================================
`metastore-setup` encountered an error. The command log above may offer clues. If the error
pertains to SSH, you may be able to get useful information by setting the RUST_LOG=debug
environment variable. Setup can be re-run safely: downloads are repeated and the init script is
replaced."#;

        println!("{}", style(MESSAGE).red().bold());

        // Errors from SSH commands
        if err.downcast_ref::<spurs::SshError>().is_some() {
            println!("An error occurred while attempting to run a command over SSH");
        }

        match err.downcast_ref::<SetupError>() {
            Some(SetupError::Unreachable { .. }) => println!(
                "The setup host cannot reach the database. Check the firewall rules between the \
                 cluster network and the database, or pass --skip_probe."
            ),
            Some(SetupError::DryRunFailed { .. }) => println!(
                "The schematool dry run failed, so the schema was not touched. Fix the problem \
                 and run `initschema`."
            ),
            _ => {}
        }

        // Print error and backtrace
        println!(
            "`metastore-setup` encountered the following error:\n{}\n{}",
            err.as_fail(),
            err.backtrace(),
        );

        std::process::exit(101);
    }
}
