//! Utilities for downloading the Hive and Hadoop runtimes and the JDBC driver, and for staging
//! the metastore jars in durable storage.

use log::info;

use super::config::{DbKind, MetastoreConfig, DEFAULT_HIVE_VERSION};

const APACHE_ARCHIVE_MIRROR: &str = "https://archive.apache.org/dist/";

const HADOOP_TARBALL_URL_TEMPLATE: &str = "hadoop/common/hadoop-VERSION/hadoop-VERSION.tar.gz";
const HIVE_TARBALL_URL_TEMPLATE: &str = "hive/hive-VERSION/apache-hive-VERSION-bin.tar.gz";

/// The Hadoop version whose common libraries go next to the Hive jars.
pub const HADOOP_VERSION: &str = "2.7.2";

/// The Hive version whose schematool initializes the metastore. It is the only one that can talk
/// to a remote database URL.
pub const SCHEMA_TOOL_HIVE_VERSION: &str = DEFAULT_HIVE_VERSION;

/// Where tarballs are unpacked on the setup host.
pub const INSTALL_ROOT: &str = "/opt";

/// A JDBC driver jar and where to get it.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DriverJar {
    pub file_name: &'static str,
    pub url: &'static str,
}

/// The driver jar for the given database.
pub fn driver_jar(kind: DbKind) -> DriverJar {
    match kind {
        DbKind::Mysql => DriverJar {
            file_name: "mariadb-java-client-2.6.1.jar",
            url: "https://downloads.mariadb.com/Connectors/java/connector-java-2.6.1/\
                  mariadb-java-client-2.6.1.jar",
        },
        DbKind::Postgres => DriverJar {
            file_name: "postgresql-42.2.2.jar",
            url: "https://repo1.maven.org/maven2/org/postgresql/postgresql/42.2.2/\
                  postgresql-42.2.2.jar",
        },
        DbKind::Mssql => DriverJar {
            file_name: "mssql-jdbc-8.2.2.jre8.jar",
            url: "https://repo1.maven.org/maven2/com/microsoft/sqlserver/mssql-jdbc/8.2.2.jre8/\
                  mssql-jdbc-8.2.2.jre8.jar",
        },
    }
}

pub fn hadoop_tarball_url(version: &str) -> String {
    APACHE_ARCHIVE_MIRROR.to_owned() + &HADOOP_TARBALL_URL_TEMPLATE.replace("VERSION", version)
}

pub fn hive_tarball_url(version: &str) -> String {
    APACHE_ARCHIVE_MIRROR.to_owned() + &HIVE_TARBALL_URL_TEMPLATE.replace("VERSION", version)
}

/// Where the given Hive version is unpacked.
pub fn hive_home(version: &str) -> String {
    dir!(INSTALL_ROOT, format!("apache-hive-{}-bin", version))
}

pub fn hadoop_home() -> String {
    dir!(INSTALL_ROOT, format!("hadoop-{}", HADOOP_VERSION))
}

/// The last path component of `url`.
pub fn file_name_of(url: &str) -> &str {
    url.rsplit('/').next().unwrap_or(url)
}

/// Where the metastore jars are staged: `<storage_root>/<jar path>`.
pub fn jars_dir(config: &MetastoreConfig, storage_root: &str) -> String {
    dir!(storage_root, config.jar_path.as_str())
}

/// The classpath glob the cluster uses to find the staged jars.
pub fn jars_glob(config: &MetastoreConfig, storage_root: &str) -> String {
    dir!(jars_dir(config, storage_root), "*")
}

/// Downloads artifacts and moves them around on the setup host.
pub trait ArtifactFetcher {
    /// Download the tarball at `url` and unpack it into `into_dir`.
    fn fetch_tarball(&self, url: &str, into_dir: &str) -> Result<(), failure::Error>;

    /// Download `url` into the working directory as `file_name`.
    fn fetch_file(&self, url: &str, file_name: &str) -> Result<(), failure::Error>;

    /// Copy a previously fetched file from the working directory into `dir`.
    fn install_file(&self, file_name: &str, dir: &str) -> Result<(), failure::Error>;

    /// Recursively copy the contents of `from` into `to`, creating `to` if needed.
    fn copy_dir_contents(&self, from: &str, to: &str) -> Result<(), failure::Error>;
}

/// One step of artifact acquisition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Step {
    Tarball { url: String, into_dir: String },
    File { url: String, file_name: String },
    Install { file_name: String, dir: String },
    CopyContents { from: String, to: String },
}

/// The ordered list of downloads and copies needed for `config`.
///
/// Hadoop and the default Hive build are always fetched, since the latter's schematool is used to
/// initialize the metastore. A different metastore version gets its own runtime too, and the
/// driver jar is installed into every Hive `lib` directory. Finally, the requested version's jars
/// and the Hadoop common libraries are staged under `storage_root`.
pub fn plan_downloads(config: &MetastoreConfig, storage_root: &str) -> Vec<Step> {
    let driver = driver_jar(config.db_kind);
    let version = config.hive_version.as_str();

    let mut plan = vec![
        Step::Tarball {
            url: hadoop_tarball_url(HADOOP_VERSION),
            into_dir: INSTALL_ROOT.into(),
        },
        Step::Tarball {
            url: hive_tarball_url(SCHEMA_TOOL_HIVE_VERSION),
            into_dir: INSTALL_ROOT.into(),
        },
        Step::File {
            url: driver.url.into(),
            file_name: driver.file_name.into(),
        },
        Step::Install {
            file_name: driver.file_name.into(),
            dir: dir!(hive_home(SCHEMA_TOOL_HIVE_VERSION), "lib"),
        },
    ];

    if config.needs_version_specific_runtime() {
        plan.push(Step::Tarball {
            url: hive_tarball_url(version),
            into_dir: INSTALL_ROOT.into(),
        });
        plan.push(Step::Install {
            file_name: driver.file_name.into(),
            dir: dir!(hive_home(version), "lib"),
        });
    }

    let jars_dir = jars_dir(config, storage_root);
    plan.push(Step::CopyContents {
        from: dir!(hive_home(version), "lib"),
        to: jars_dir.clone(),
    });
    plan.push(Step::CopyContents {
        from: dir!(hadoop_home(), "share/hadoop/common/lib"),
        to: jars_dir,
    });

    plan
}

/// Execute `plan` in order, stopping at the first failure. There are no retries.
pub fn acquire<F: ArtifactFetcher + ?Sized>(fetcher: &F, plan: &[Step]) -> Result<(), failure::Error> {
    for step in plan {
        info!("{:?}", step);

        match step {
            Step::Tarball { url, into_dir } => fetcher.fetch_tarball(url, into_dir)?,
            Step::File { url, file_name } => fetcher.fetch_file(url, file_name)?,
            Step::Install { file_name, dir } => fetcher.install_file(file_name, dir)?,
            Step::CopyContents { from, to } => fetcher.copy_dir_contents(from, to)?,
        }
    }

    Ok(())
}
