//! Failures specific to metastore setup. Anything else (SSH, I/O, JSON) is propagated as a plain
//! `failure::Error`.

use failure::Fail;

#[derive(Debug, Fail)]
pub enum SetupError {
    #[fail(
        display = "unknown database type `{}` (expected one of mssql, mysql, postgres)",
        _0
    )]
    UnknownDbKind(String),

    /// A non-secret parameter failed validation. Never construct this with a secret value.
    #[fail(display = "invalid {} `{}`: {}", field, value, reason)]
    InvalidValue {
        field: &'static str,
        value: String,
        reason: &'static str,
    },

    #[fail(display = "initmetastore must be `Yes` or `No`, got `{}`", _0)]
    InvalidInitFlag(String),

    #[fail(display = "secret `{}` not found in scope `{}`", key, scope)]
    SecretNotFound { scope: String, key: String },

    #[fail(
        display = "metastore database {}:{} is not reachable from the setup host",
        host, port
    )]
    Unreachable { host: String, port: u16 },

    #[fail(
        display = "schematool dry run to schema {} failed; the metastore was not initialized",
        target
    )]
    DryRunFailed { target: String },

    #[fail(display = "`{}` failed: {}", cmd, status)]
    CommandFailed { cmd: String, status: String },
}
