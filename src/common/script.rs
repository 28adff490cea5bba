//! Generating the cluster init script.
//!
//! The script writes the Spark driver configuration that points the metastore client at the
//! external database. Everything except the credentials is baked in at generation time. The
//! credentials are expanded from `$SQLUSER` and `$SQLPASSWD` when the cluster boots, so the
//! generated file holds no secrets and the same configuration always produces the same bytes.

use log::info;

use super::{config::MetastoreConfig, error::SetupError, hive, remote::FileStore};

/// Where init scripts are written by default (the durable storage mount on the setup host).
pub const DEFAULT_SCRIPTS_DIR: &str = "/dbfs/databricks/scripts";

/// Where the durable storage is mounted on the setup host and on the cluster nodes.
pub const DEFAULT_STORAGE_ROOT: &str = "/dbfs/databricks";

/// The Spark configuration file written on the cluster driver.
const SPARK_CONF_PATH: &str = "/databricks/driver/conf/00-custom-spark.conf";

/// Placeholders: `{conf_path}`, `{jdbc_url}`, `{driver_class}`, `{hive_version}`, `{jars_glob}`.
/// Any other brace is literal.
const INIT_SCRIPT_TEMPLATE: &str = r#"#!/bin/sh
# Loads environment variables to determine the correct JDBC driver to use.
. /etc/environment
# The quoted heredoc label disables variable interpolation.
cat << 'EOF' > {conf_path}
[driver] {
    # Hive specific configuration options.
    # The spark.hadoop prefix makes sure these options propagate to the metastore client.
    # JDBC connect string for a JDBC metastore
    "spark.hadoop.javax.jdo.option.ConnectionURL" = "{jdbc_url}"

    # Driver class name for a JDBC metastore
    "spark.hadoop.javax.jdo.option.ConnectionDriverName" = "{driver_class}"

    # Spark specific configuration options
    "spark.sql.hive.metastore.version" = "{hive_version}"
    "spark.sql.hive.metastore.jars" = "{jars_glob}"

    "spark.hadoop.datanucleus.fixedDatastore" = "true"
    "spark.hadoop.datanucleus.autoCreateSchema" = "false"

EOF

USERNAME="$SQLUSER"
PASSWORD="$SQLPASSWD"

# The credentials come from the cluster environment, so this heredoc expands variables.
cat << EOF >> {conf_path}
    "spark.hadoop.javax.jdo.option.ConnectionUserName" = "$USERNAME"
    "spark.hadoop.javax.jdo.option.ConnectionPassword" = "$PASSWORD"
}
EOF
"#;

/// Replace each `{name}` in `template` whose name appears in `values`. This is a single pass, so
/// substituted text is never scanned for placeholders again.
fn fill(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];

        let replacement = after.find('}').and_then(|end| {
            let name = &after[..end];
            values
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (*value, end))
        });

        match replacement {
            Some((value, end)) => {
                out.push_str(value);
                rest = &after[end + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}

/// Escape `value` for a double-quoted HOCON string. Values that cannot be embedded safely (line
/// breaks would end the heredoc early) are rejected.
fn conf_string(field: &'static str, value: &str) -> Result<String, SetupError> {
    if value.chars().any(char::is_control) {
        return Err(SetupError::InvalidValue {
            field,
            value: value.escape_debug().to_string(),
            reason: "must not contain line breaks or control characters",
        });
    }

    Ok(value.replace('\\', "\\\\").replace('"', "\\\""))
}

/// The values filled into the init script.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InitScript {
    jdbc_url: String,
    driver_class: String,
    hive_version: String,
    jars_glob: String,
}

impl InitScript {
    pub fn new(config: &MetastoreConfig, storage_root: &str) -> Self {
        InitScript {
            jdbc_url: config.jdbc_url.clone(),
            driver_class: config.driver_class().into(),
            hive_version: config.hive_version.to_string(),
            jars_glob: hive::jars_glob(config, storage_root),
        }
    }

    pub fn render(&self) -> Result<String, failure::Error> {
        let jdbc_url = conf_string("jdbcurl", &self.jdbc_url)?;
        let driver_class = conf_string("driver class", &self.driver_class)?;
        let hive_version = conf_string("hiveversion", &self.hive_version)?;
        let jars_glob = conf_string("metastorejarpath", &self.jars_glob)?;

        Ok(fill(
            INIT_SCRIPT_TEMPLATE,
            &[
                ("conf_path", SPARK_CONF_PATH),
                ("jdbc_url", &jdbc_url),
                ("driver_class", &driver_class),
                ("hive_version", &hive_version),
                ("jars_glob", &jars_glob),
            ],
        ))
    }
}

/// The init script path for the given configuration: `external-metastore-<clean version>.sh`.
/// Different versions never collide.
pub fn script_path(scripts_dir: &str, config: &MetastoreConfig) -> String {
    dir!(
        scripts_dir,
        format!("external-metastore-{}.sh", config.clean_version())
    )
}

/// Render the init script and write it, replacing any existing script at the same path. Returns
/// the path.
pub fn publish<S: FileStore + ?Sized>(
    store: &S,
    config: &MetastoreConfig,
    storage_root: &str,
    scripts_dir: &str,
) -> Result<String, failure::Error> {
    let contents = InitScript::new(config, storage_root).render()?;
    let path = script_path(scripts_dir, config);

    store.put(&path, &contents, 0o755)?;
    info!("Wrote cluster init script to {}", path);

    Ok(path)
}

/// Turn a path under the `/dbfs` mount into a `dbfs:` URI, which is how clusters refer to it.
pub fn dbfs_uri(path: &str) -> String {
    if path.starts_with("/dbfs/") {
        format!("dbfs:{}", &path["/dbfs".len()..])
    } else {
        path.into()
    }
}

/// What the operator needs to do after setup: attach the init script and add the credential
/// environment variables, or paste the equivalent Spark configuration into the cluster UI.
pub struct SetupSummary<'c> {
    config: &'c MetastoreConfig,
    script_path: String,
    jars_glob: String,
}

impl<'c> SetupSummary<'c> {
    pub fn new(config: &'c MetastoreConfig, storage_root: &str, script_path: &str) -> Self {
        SetupSummary {
            config,
            script_path: script_path.into(),
            jars_glob: hive::jars_glob(config, storage_root),
        }
    }

    fn secret_ref(&self, key: &str) -> String {
        format!("{{{{secrets/{}/{}}}}}", self.config.secret_scope, key)
    }
}

impl std::fmt::Display for SetupSummary<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let config = self.config;
        let user = self.secret_ref(&config.user_secret_key);
        let password = self.secret_ref(&config.password_secret_key);

        writeln!(f, "Setup using init script:")?;
        writeln!(f)?;
        writeln!(f, "Cluster init script: {}", dbfs_uri(&self.script_path))?;
        writeln!(f, "Envs to add:")?;
        writeln!(f, "SQLUSER={}", user)?;
        writeln!(f, "SQLPASSWD={}", password)?;
        writeln!(f)?;
        writeln!(
            f,
            "Setup using the UI. Copy these to the Spark Conf in the cluster config:"
        )?;
        writeln!(f)?;

        let conf = [
            ("spark.hadoop.javax.jdo.option.ConnectionURL", config.jdbc_url.as_str()),
            (
                "spark.hadoop.javax.jdo.option.ConnectionDriverName",
                config.driver_class(),
            ),
            ("spark.sql.hive.metastore.version", config.hive_version.as_str()),
            ("spark.sql.hive.metastore.jars", self.jars_glob.as_str()),
            ("spark.hadoop.datanucleus.fixedDatastore", "true"),
            ("spark.hadoop.datanucleus.autoCreateSchema", "false"),
            ("spark.hadoop.javax.jdo.option.ConnectionUserName", user.as_str()),
            ("spark.hadoop.javax.jdo.option.ConnectionPassword", password.as_str()),
        ];

        for (key, value) in conf.iter() {
            writeln!(f, "    \"{}\" = \"{}\"", key, value)?;
        }

        Ok(())
    }
}
