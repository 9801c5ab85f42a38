use anyhow::{Context, Result};
use clap::Parser;
use std::{env, path::PathBuf};

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub uploads_dir: PathBuf,
    pub public_dir: PathBuf,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Single-file upload server")]
pub struct Args {
    /// Host to bind to (overrides UPLOAD_INTAKE_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides UPLOAD_INTAKE_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory receiving uploaded files (overrides UPLOAD_INTAKE_UPLOADS_DIR)
    #[arg(long)]
    pub uploads_dir: Option<PathBuf>,

    /// Directory served as static content (overrides UPLOAD_INTAKE_PUBLIC_DIR)
    #[arg(long)]
    pub public_dir: Option<PathBuf>,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig.
    pub fn from_env_and_args() -> Result<Self> {
        Self::merge(Args::parse(), |key| env::var(key))
    }

    /// Layer CLI args over values from `lookup`, then over defaults.
    pub fn merge<F>(args: Args, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Result<String, env::VarError>,
    {
        let env_host = lookup("UPLOAD_INTAKE_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = match lookup("UPLOAD_INTAKE_PORT") {
            Ok(value) => value
                .parse::<u16>()
                .with_context(|| format!("parsing UPLOAD_INTAKE_PORT value `{}`", value))?,
            Err(env::VarError::NotPresent) => 3000,
            Err(err) => return Err(err).context("reading UPLOAD_INTAKE_PORT"),
        };
        let env_uploads =
            lookup("UPLOAD_INTAKE_UPLOADS_DIR").unwrap_or_else(|_| "./uploads".into());
        let env_public = lookup("UPLOAD_INTAKE_PUBLIC_DIR").unwrap_or_else(|_| "./public".into());

        Ok(Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            uploads_dir: args.uploads_dir.unwrap_or_else(|| env_uploads.into()),
            public_dir: args.public_dir.unwrap_or_else(|| env_public.into()),
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(
        pairs: &'static [(&'static str, &'static str)],
    ) -> impl Fn(&str) -> Result<String, env::VarError> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned().ok_or(env::VarError::NotPresent)
    }

    #[test]
    fn defaults_when_nothing_set() {
        let cfg = AppConfig::merge(Args::default(), env_of(&[])).unwrap();
        assert_eq!(cfg.addr(), "0.0.0.0:3000");
        assert_eq!(cfg.uploads_dir, PathBuf::from("./uploads"));
        assert_eq!(cfg.public_dir, PathBuf::from("./public"));
    }

    #[test]
    fn args_override_env() {
        let args = Args::parse_from(["upload-intake", "--port", "8080", "--uploads-dir", "/srv/in"]);
        let env = env_of(&[
            ("UPLOAD_INTAKE_PORT", "9000"),
            ("UPLOAD_INTAKE_HOST", "127.0.0.1"),
            ("UPLOAD_INTAKE_UPLOADS_DIR", "/tmp/ignored"),
        ]);
        let cfg = AppConfig::merge(args, env).unwrap();
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.host, "127.0.0.1");
        assert_eq!(cfg.uploads_dir, PathBuf::from("/srv/in"));
    }

    #[test]
    fn bad_port_is_an_error() {
        let err = AppConfig::merge(Args::default(), env_of(&[("UPLOAD_INTAKE_PORT", "http")]))
            .unwrap_err();
        assert!(err.to_string().contains("UPLOAD_INTAKE_PORT"));
    }
}
