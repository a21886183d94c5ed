use std::env;
use std::fs;
use std::fs::File;
use std::io::ErrorKind;
use std::io::Result as IoResult;
use std::path::Path;
use std::path::PathBuf;

use dirs::home_dir;
use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde_yaml::Mapping;
use tracing::debug;

use crate::ConfigError;

const KUBECONFIG: &str = "KUBECONFIG";
const BACKUP_SUFFIX: &str = ".bak";

pub const API_VERSION: &str = "v1";
pub const KIND: &str = "Config";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub cluster: ClusterDetail,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ClusterDetail {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insecure_skip_tls_verify: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate_authority: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate_authority_data: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub server: String,
    /// fields not modelled above, written back untouched
    #[serde(flatten)]
    pub extra: Mapping,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Context {
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub context: ContextDetail,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ContextDetail {
    #[serde(default, deserialize_with = "null_as_default")]
    pub cluster: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub user: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(flatten)]
    pub extra: Mapping,
}

impl ContextDetail {
    pub fn namespace(&self) -> &str {
        match &self.namespace {
            Some(nm) => nm,
            None => "default",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub user: UserDetail,
}

/// Credentials are never interpreted, only carried between files.
/// `exec`, `auth-provider` and anything else unknown end up in `extra`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct UserDetail {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_certificate: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_certificate_data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_key_data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(flatten)]
    pub extra: Mapping,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct KubeConfig {
    #[serde(skip)]
    pub path: PathBuf,
    #[serde(
        rename = "apiVersion",
        default = "default_api_version",
        deserialize_with = "null_as_api_version"
    )]
    pub api_version: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub clusters: Vec<Cluster>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub contexts: Vec<Context>,
    #[serde(
        default,
        deserialize_with = "empty_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub current_context: Option<String>,
    #[serde(default = "default_kind", deserialize_with = "null_as_kind")]
    pub kind: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub preferences: Mapping,
    #[serde(default, deserialize_with = "null_as_default")]
    pub users: Vec<User>,
    #[serde(flatten)]
    pub extra: Mapping,
}

impl Default for KubeConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::new(),
            api_version: default_api_version(),
            clusters: vec![],
            contexts: vec![],
            current_context: None,
            kind: default_kind(),
            preferences: Mapping::new(),
            users: vec![],
            extra: Mapping::new(),
        }
    }
}

impl KubeConfig {
    /// path of the kube config to edit: first entry of `KUBECONFIG`,
    /// otherwise `$HOME/.kube/config`
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        if let Some(paths) = env::var_os(KUBECONFIG) {
            if let Some(path) = env::split_paths(&paths).find(|p| !p.as_os_str().is_empty()) {
                debug!(path = %path.display(), "using {}", KUBECONFIG);
                return Ok(path);
            }
        }
        let home_dir = home_dir().ok_or(ConfigError::NoHomeDir)?;
        Ok(home_dir.join(".kube").join("config"))
    }

    /// read from default location, missing file yields an empty config
    pub fn from_home() -> Result<Self, ConfigError> {
        Self::load(Self::default_path()?)
    }

    /// read an existing file; missing file is an error
    pub fn from_file<T: AsRef<Path>>(path: T) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(ConfigError::FileNotFound(path.to_path_buf()))
            }
            Err(err) => return Err(err.into()),
        };
        let mut config = Self::from_yaml(&contents)?;
        config.path = path.to_path_buf();
        debug!(
            path = %path.display(),
            clusters = config.clusters.len(),
            users = config.users.len(),
            contexts = config.contexts.len(),
            "loaded kube config"
        );
        Ok(config)
    }

    /// read the file if it exists, otherwise start from an empty config bound to `path`
    pub fn load<T: AsRef<Path>>(path: T) -> Result<Self, ConfigError> {
        match Self::from_file(path) {
            Err(ConfigError::FileNotFound(path)) => {
                debug!(path = %path.display(), "no kube config, using empty one");
                Ok(Self {
                    path,
                    ..Default::default()
                })
            }
            result => result,
        }
    }

    pub fn from_yaml(contents: &str) -> Result<Self, ConfigError> {
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Option<Self> = serde_yaml::from_str(contents)?;
        Ok(config.unwrap_or_default())
    }

    /// serialize to `path`, overwriting whatever is there
    pub fn to_file<T: AsRef<Path>>(&self, path: T) -> Result<(), ConfigError> {
        let file = File::create(path)?;
        Ok(serde_yaml::to_writer(file, self)?)
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&self.path)
    }

    /// Copy the current file to `<path>.bak`, rewrite it and make it owner only.
    /// If the backup cannot be made the file is not touched.
    pub fn save_to<T: AsRef<Path>>(&self, path: T) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            let backup = backup_path(path);
            debug!(backup = %backup.display(), "backing up kube config");
            fs::copy(path, &backup)?;
        } else if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)?;
            }
        }

        self.to_file(path)?;
        restrict_permissions(path)?;
        debug!(path = %path.display(), "saved kube config");
        Ok(())
    }

    pub fn find_context(&self, name: &str) -> Option<&Context> {
        self.contexts.iter().find(|c| c.name == name)
    }

    pub fn find_cluster(&self, name: &str) -> Option<&Cluster> {
        self.clusters.iter().find(|c| c.name == name)
    }

    pub fn find_user(&self, name: &str) -> Option<&User> {
        self.users.iter().find(|u| u.name == name)
    }

    pub fn current_context(&self) -> Option<&Context> {
        self.current_context
            .as_deref()
            .and_then(|name| self.find_context(name))
    }

    /// add user unless one with the same name exists; returns true if added
    pub fn add_user(&mut self, user: User) -> bool {
        if self.find_user(&user.name).is_some() {
            return false;
        }
        self.users.push(user);
        true
    }

    /// add cluster unless one with the same name exists; returns true if added
    pub fn add_cluster(&mut self, cluster: Cluster) -> bool {
        if self.find_cluster(&cluster.name).is_some() {
            return false;
        }
        self.clusters.push(cluster);
        true
    }

    /// insert or replace in place, returning the replaced context
    pub fn put_context(&mut self, context: Context) -> Option<Context> {
        let prev = self.contexts.iter_mut().find(|c| c.name.eq(&context.name));
        match prev {
            Some(prev) => Some(std::mem::replace(prev, context)),
            None => {
                self.contexts.push(context);
                None
            }
        }
    }
}

pub fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(BACKUP_SUFFIX);
    PathBuf::from(name)
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> IoResult<()> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> IoResult<()> {
    Ok(())
}

fn default_api_version() -> String {
    API_VERSION.to_owned()
}

fn default_kind() -> String {
    KIND.to_owned()
}

/// kubectl writes `null` for empty sections
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn null_as_api_version<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_else(default_api_version))
}

fn null_as_kind<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_else(default_kind))
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|name| !name.is_empty()))
}
