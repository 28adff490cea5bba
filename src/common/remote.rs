//! The setup host: an SSH-reachable node inside the cluster network with the durable storage
//! mounted. Every external side effect of the setup goes through one of the capability traits
//! below, which `RemoteHost` implements on top of a `spurs` shell.

use std::io::Write;
use std::process::{Command, Stdio};

use log::{debug, info, warn};

use spurs::{cmd, Execute, SshShell};

use super::{
    config::MetastoreConfig,
    error::SetupError,
    hive::{self, ArtifactFetcher},
    schema::{Invocation, SchemaMigrator},
    shell_quote, Login,
};

/// How long the reachability probe waits for the database port, in seconds.
pub const PROBE_TIMEOUT_SECS: usize = 5;

/// The directory (relative to the setup user's home) where downloads land.
pub const WORK_DIR: &str = "metastore-setup";

/// A place to durably write files, replacing whatever was there.
pub trait FileStore {
    /// Write `contents` to `path` with the given permission bits, creating the parent directory.
    fn put(&self, path: &str, contents: &str, mode: u32) -> Result<(), failure::Error>;

    /// Remove `path` if it exists.
    fn remove(&self, path: &str) -> Result<(), failure::Error>;
}

/// Checks whether the metastore database accepts connections.
pub trait ReachabilityProbe {
    fn probe(&self, host: &str, port: u16) -> Result<(), failure::Error>;
}

/// Check that the configured database is reachable, unless `skip`.
pub fn check_reachable<P: ReachabilityProbe + ?Sized>(
    probe: &P,
    config: &MetastoreConfig,
    skip: bool,
) -> Result<(), failure::Error> {
    if skip {
        warn!("Not checking whether {}:{} is reachable", config.db_host, config.db_port);
        return Ok(());
    }

    info!("Checking that {}:{} is reachable", config.db_host, config.db_port);
    probe.probe(&config.db_host, config.db_port)
}

/// A connection to the setup host.
pub struct RemoteHost {
    shell: SshShell,
    username: String,
    hostname: String,
    port: u16,
    dry_run: bool,
}

impl RemoteHost {
    /// Connect to the setup host and create the working directory. With `dry_run`, commands are
    /// printed but not executed.
    pub fn connect(login: &Login<'_, '_>, dry_run: bool) -> Result<Self, failure::Error> {
        let addr = login.addr();
        let mut shell = SshShell::with_default_key(login.username.as_str(), &addr)?;
        shell.set_dry_run(dry_run);

        shell.run(cmd!("mkdir -p {}", WORK_DIR))?;

        Ok(RemoteHost {
            shell,
            username: login.username.as_str().into(),
            hostname: login.hostname.into(),
            port: login.port,
            dry_run,
        })
    }

    /// Write `contents` to `path` by piping them through the local `ssh` client. Unlike `cmd!`,
    /// this does not echo the contents, which may include secrets.
    fn upload(&self, path: &str, contents: &str, mode: u32) -> Result<(), failure::Error> {
        let remote_cmd = format!(
            "umask 077 && cat > {path} && chmod {mode:o} {path}",
            path = shell_quote(path),
            mode = mode,
        );

        debug!("Uploading {} bytes to {}", contents.len(), path);

        let home = std::env::var("HOME")?;
        let args = upload_args(
            &dir!(home, DEFAULT_KEY),
            &self.username,
            &self.hostname,
            self.port,
            &remote_cmd,
        );

        let mut child = Command::new("ssh")
            .args(&args)
            .stdin(Stdio::piped())
            .spawn()?;

        {
            let stdin = child
                .stdin
                .as_mut()
                .ok_or_else(|| failure::format_err!("unable to open ssh stdin"))?;
            stdin.write_all(contents.as_bytes())?;
        }

        let status = child.wait()?;
        if !status.success() {
            return Err(SetupError::CommandFailed {
                cmd: format!("upload to {}", path),
                status: status.to_string(),
            }
            .into());
        }

        Ok(())
    }
}

/// The key `SshShell::with_default_key` authenticates with, relative to the local home directory.
const DEFAULT_KEY: &str = ".ssh/id_rsa";

/// Arguments for the local `ssh` client so that it authenticates with `identity` only, like the
/// `spurs` connection does.
fn upload_args(
    identity: &str,
    username: &str,
    hostname: &str,
    port: u16,
    remote_cmd: &str,
) -> Vec<String> {
    // ssh takes IPv6 literals without brackets.
    let hostname = hostname.trim_start_matches('[').trim_end_matches(']');

    vec![
        "-i".into(),
        identity.into(),
        "-o".into(),
        "IdentitiesOnly=yes".into(),
        "-o".into(),
        "BatchMode=yes".into(),
        "-p".into(),
        port.to_string(),
        format!("{}@{}", username, hostname),
        remote_cmd.into(),
    ]
}

/// Download `url` into the working directory and unpack it into `into_dir`. The install root is
/// owned by root, so the writes there go through `sudo`.
fn tarball_commands(url: &str, into_dir: &str) -> (String, String, String) {
    let tarball = hive::file_name_of(url);

    (
        format!("wget -nv -O {} {}", tarball, url),
        format!("sudo mkdir -p {}", into_dir),
        format!("sudo tar -xzf {} --directory {}", tarball, into_dir),
    )
}

/// Copy a downloaded file from the working directory into a directory under the install root.
fn install_commands(file_name: &str, dir: &str) -> (String, String) {
    (
        format!("sudo mkdir -p {}", dir),
        format!("sudo cp {} {}", file_name, dir),
    )
}

impl FileStore for RemoteHost {
    fn put(&self, path: &str, contents: &str, mode: u32) -> Result<(), failure::Error> {
        let parent = std::path::Path::new(path)
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty());
        if let Some(parent) = parent {
            self.shell
                .run(cmd!("mkdir -p {}", shell_quote(&parent.display().to_string())))?;
        }

        if self.dry_run {
            info!("(dry run) Would write {} bytes to {}", contents.len(), path);
            return Ok(());
        }

        self.upload(path, contents, mode)
    }

    fn remove(&self, path: &str) -> Result<(), failure::Error> {
        self.shell.run(cmd!("rm -f {}", shell_quote(path)))?;
        Ok(())
    }
}

impl ReachabilityProbe for RemoteHost {
    fn probe(&self, host: &str, port: u16) -> Result<(), failure::Error> {
        match self
            .shell
            .run(cmd!("nc -vzw{} {} {}", PROBE_TIMEOUT_SECS, host, port))
        {
            Ok(_) => Ok(()),
            Err(err) => {
                debug!("Probe of {}:{} failed: {}", host, port, err);
                Err(SetupError::Unreachable {
                    host: host.into(),
                    port,
                }
                .into())
            }
        }
    }
}

impl ArtifactFetcher for RemoteHost {
    fn fetch_tarball(&self, url: &str, into_dir: &str) -> Result<(), failure::Error> {
        let shell = &self.shell;
        let (fetch, mkdir, unpack) = tarball_commands(url, into_dir);

        with_shell! { shell in WORK_DIR =>
            cmd!("{}", fetch),
            cmd!("{}", mkdir),
            cmd!("{}", unpack),
        }

        Ok(())
    }

    fn fetch_file(&self, url: &str, file_name: &str) -> Result<(), failure::Error> {
        self.shell
            .run(cmd!("wget -nv -O {} {}", file_name, url).cwd(WORK_DIR))?;
        Ok(())
    }

    fn install_file(&self, file_name: &str, dir: &str) -> Result<(), failure::Error> {
        let shell = &self.shell;
        let (mkdir, copy) = install_commands(file_name, dir);

        with_shell! { shell in WORK_DIR =>
            cmd!("{}", mkdir),
            cmd!("{}", copy),
        }

        Ok(())
    }

    fn copy_dir_contents(&self, from: &str, to: &str) -> Result<(), failure::Error> {
        let shell = &self.shell;

        with_shell! { shell =>
            cmd!("mkdir -p {}", to),
            cmd!("cp -r {}/. {}", from, to),
        }

        Ok(())
    }
}

impl SchemaMigrator for RemoteHost {
    fn run_schema_tool(&self, invocation: &Invocation) -> Result<String, failure::Error> {
        let hive_home = hive::hive_home(hive::SCHEMA_TOOL_HIVE_VERSION);

        // Source the snapshot first so the arguments can refer to the credentials by name.
        let output = self.shell.run(
            cmd!(
                ". {} && HIVE_HOME={} HADOOP_HOME={} {}/bin/schematool {}",
                super::env::ENV_FILE,
                hive_home,
                hive::hadoop_home(),
                hive_home,
                invocation.args().join(" ")
            )
            .use_bash(),
        )?;

        Ok(output.stdout)
    }
}
