use crate::error::{Result, ServerError};
use blobport_core::{BackendBuilder, DEFAULT_ID_FIELD};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default = "default_id_field")]
    pub id_field: String,
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    pub backend: BackendConfig,
}

/// Storage backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    pub kind: BackendKind,
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default)]
    pub prefix: Option<String>,
    pub s3: Option<S3Config>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Memory,
    Fs,
    Local,
    S3,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Memory => "memory",
            BackendKind::Fs => "fs",
            BackendKind::Local => "local",
            BackendKind::S3 => "s3",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Config {
    pub bucket: String,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub allow_http: bool,
    pub credentials: Option<S3Credentials>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
}

fn default_bind_addr() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_id_field() -> String {
    DEFAULT_ID_FIELD.to_string()
}

fn default_max_body_bytes() -> usize {
    32 * 1024 * 1024
}

/// `BLOBPORT_BIND_ADDR` overrides `bind_addr`, `BLOBPORT_BACKEND__KIND`
/// overrides `backend.kind`.
fn environment() -> ::config::Environment {
    ::config::Environment::with_prefix("BLOBPORT")
        .prefix_separator("_")
        .separator("__")
}

impl Config {
    pub fn from_file(path: &str) -> Result<Self> {
        Self::load(path, environment())
    }

    fn load(path: &str, environment: ::config::Environment) -> Result<Self> {
        let settings = ::config::Config::builder()
            .add_source(::config::File::with_name(path))
            .add_source(environment)
            .build()
            .map_err(|e| ServerError::Config(e.to_string()))?;

        let config: Config = settings
            .try_deserialize()
            .map_err(|e| ServerError::Config(e.to_string()))?;

        Ok(config)
    }
}

impl BackendConfig {
    pub fn builder(&self) -> BackendBuilder {
        let mut builder = BackendBuilder::new().backend(self.kind.as_str());

        if let Some(path) = &self.path {
            builder = builder.root(path.clone());
        }
        if let Some(prefix) = &self.prefix {
            builder = builder.prefix(prefix.clone());
        }

        if let Some(s3) = &self.s3 {
            builder = builder
                .s3_bucket(s3.bucket.clone())
                .s3_allow_http(s3.allow_http);
            if let Some(region) = &s3.region {
                builder = builder.s3_region(region.clone());
            }
            if let Some(endpoint) = &s3.endpoint {
                builder = builder.s3_endpoint(endpoint.clone());
            }
            if let Some(credentials) = &s3.credentials {
                builder = builder.s3_credentials(
                    credentials.access_key_id.clone(),
                    credentials.secret_access_key.clone(),
                );
            }
        }

        builder
    }
}
