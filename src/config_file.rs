//! Generic config file loader

use std::{
    ffi::OsString,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, bail, Context, Result};
use serde::{de::DeserializeOwned, Serialize};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConfigBackend {
    Json5,
    Yaml,
    Hcl,
}

impl ConfigBackend {
    pub fn decode<T: DeserializeOwned>(self, s: &str) -> Result<T> {
        match self {
            ConfigBackend::Json5 => serde_json5::from_str(s).map_err(|e| anyhow!("{e}")),
            ConfigBackend::Yaml => serde_yml::from_str(s).map_err(|e| anyhow!("{e}")),
            ConfigBackend::Hcl => hcl::from_str(s).map_err(|e| anyhow!("{e}")),
        }
    }

    pub fn load_config_file<T: DeserializeOwned>(self, path: &Path) -> Result<T> {
        let s = std::fs::read_to_string(path)
            .with_context(|| anyhow!("loading config file from {path:?}"))?;
        self.decode(&s)
            .with_context(|| anyhow!("decoding {self:?} from config file {path:?}"))
    }

    pub fn encode<T: Serialize>(self, value: &T) -> Result<String> {
        match self {
            ConfigBackend::Json5 => serde_json5::to_string(value)
                .map_err(|e| anyhow!("encoding config as JSON5: {e}")),
            ConfigBackend::Yaml => {
                serde_yml::to_string(value).with_context(|| anyhow!("encoding config as YAML"))
            }
            ConfigBackend::Hcl => {
                hcl::to_string(value).with_context(|| anyhow!("encoding config as HCL"))
            }
        }
    }

    pub fn save_config_file<T: Serialize>(self, path: &Path, value: &T) -> Result<()> {
        let s = self.encode(value)?;
        std::fs::write(path, s).with_context(|| anyhow!("writing config file to {path:?}"))
    }
}

pub const FILE_EXTENSIONS: &[(&str, ConfigBackend)] = &[
    ("json5", ConfigBackend::Json5),
    ("json", ConfigBackend::Json5),
    ("yml", ConfigBackend::Yaml),
    ("yaml", ConfigBackend::Yaml),
    ("hcl", ConfigBackend::Hcl),
];

pub fn backend_from_path(path: &Path) -> Result<ConfigBackend> {
    if let Some(ext) = path.extension() {
        if let Some(ext) = ext.to_str() {
            if let Some((_, backend)) = FILE_EXTENSIONS.iter().find(|(e, _b)| *e == ext) {
                Ok(*backend)
            } else {
                bail!("given file path does have an unknown extension {ext:?}: {path:?}")
            }
        } else {
            bail!("given file path does have an extension that is not unicode: {path:?}")
        }
    } else {
        bail!(
            "given file path does not have an extension \
             for determining the file type: {path:?}"
        )
    }
}

pub fn save_config_file<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let backend = backend_from_path(path)?;
    backend.save_config_file(path, value)
}

fn add_extension(path: &Path, extension: &str) -> Option<PathBuf> {
    path.file_name()?;
    let mut s: OsString = path.as_os_str().to_owned();
    s.push(".");
    s.push(extension);
    Some(s.into())
}

pub trait LoadConfigFile: DeserializeOwned {
    /// The extensions from `FILE_EXTENSIONS` will be appended (and
    /// tried in order, the suffix determines the parser)
    fn default_config_path_without_suffix() -> Result<Option<PathBuf>>;

    /// If `path` is given, the file must exist or an error is
    /// returned. Otherwise, a default location is checked
    /// (`default_config_path_without_suffix`) and if a file with one
    /// of the fitting file name extensions exists, it is loaded,
    /// otherwise `or_else` is called with a message mentioning what
    /// was tried; it can issue an error or generate a default config
    /// value.
    fn load_config<P: AsRef<Path>>(
        path: Option<P>,
        or_else: impl FnOnce(String) -> Result<Self>,
    ) -> Result<Self> {
        if let Some(path) = path {
            let path = path.as_ref();
            let backend = backend_from_path(path)?;
            return backend.load_config_file(path);
        }
        let Some(path) = Self::default_config_path_without_suffix()? else {
            return or_else(
                "no path was given and there is no default \
                 config location for this type"
                    .into(),
            );
        };
        let mut tried = Vec::new();
        let mut found = Vec::new();
        for (extension, backend) in FILE_EXTENSIONS {
            let path = add_extension(&path, extension)
                .ok_or_else(|| anyhow!("path is missing a file name: {path:?}"))?;
            if path.exists() {
                found.push((path.clone(), *backend));
            }
            tried.push(path);
        }
        match found.as_slice() {
            [] => or_else(format!("tried the default paths: {tried:?}")),
            [(path, backend)] => backend.load_config_file(path),
            _ => {
                let paths: Vec<_> = found.iter().map(|(path, _)| path).collect();
                bail!("multiple config file paths found, leading to ambiguity: {paths:?}")
            }
        }
    }
}
