//! Listing, import, export and switching of kube config contexts.
//!
//! Imports are add-only for clusters and users: an entry that already exists
//! under the same name is kept as is. Contexts are always refreshed from the
//! source.

use std::fs::File;
use std::path::Path;

use serde_yaml::Mapping;
use serde_yaml::Value;
use tracing::debug;
use tracing::trace;

use crate::ConfigError;
use crate::Context;
use crate::KubeConfig;

/// outcome of merging contexts from another config
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ImportSummary {
    /// number of contexts written, new or replaced
    pub contexts: usize,
    pub added_clusters: Vec<String>,
    pub added_users: Vec<String>,
}

impl KubeConfig {
    /// `name: 'user' @ 'cluster'`, current context marked with `*`
    pub fn list_contexts(&self) -> Vec<String> {
        let current = self.current_context.as_deref();
        self.contexts
            .iter()
            .map(|ctx| {
                let marker = if current == Some(ctx.name.as_str()) {
                    '*'
                } else {
                    ' '
                };
                format!(
                    "{} {}: '{}' @ '{}'",
                    marker, ctx.name, ctx.context.user, ctx.context.cluster
                )
            })
            .collect()
    }

    pub fn list_users(&self) -> Vec<String> {
        self.users.iter().map(|user| user.name.clone()).collect()
    }

    pub fn list_clusters(&self) -> Vec<String> {
        self.clusters
            .iter()
            .map(|cluster| format!("{} {}", cluster.name, cluster.cluster.server))
            .collect()
    }

    /// Merge contexts from `source` together with the clusters and users they reference.
    /// With `name`, only that context is taken and it must exist in `source`.
    /// Nothing is changed when the selection fails.
    pub fn import_from(
        &mut self,
        source: &KubeConfig,
        name: Option<&str>,
    ) -> Result<ImportSummary, ConfigError> {
        let selected: Vec<&Context> = match name {
            Some(name) => {
                let matching: Vec<&Context> =
                    source.contexts.iter().filter(|c| c.name == name).collect();
                if matching.is_empty() {
                    return Err(ConfigError::ContextNotFound {
                        name: name.to_owned(),
                        file: (!source.path.as_os_str().is_empty()).then(|| source.path.clone()),
                    });
                }
                matching
            }
            None => source.contexts.iter().collect(),
        };

        let mut cluster_names: Vec<&str> = vec![];
        let mut user_names: Vec<&str> = vec![];
        for ctx in &selected {
            let cluster = ctx.context.cluster.as_str();
            if !cluster.is_empty() && !cluster_names.contains(&cluster) {
                cluster_names.push(cluster);
            }
            let user = ctx.context.user.as_str();
            if !user.is_empty() && !user_names.contains(&user) {
                user_names.push(user);
            }
        }

        let mut summary = ImportSummary::default();

        for name in cluster_names {
            match source.find_cluster(name) {
                Some(cluster) => {
                    if self.add_cluster(cluster.clone()) {
                        summary.added_clusters.push(name.to_owned());
                    } else {
                        trace!(cluster = name, "cluster exists, keeping current entry");
                    }
                }
                None => trace!(cluster = name, "cluster not in source"),
            }
        }

        for name in user_names {
            match source.find_user(name) {
                Some(user) => {
                    if self.add_user(user.clone()) {
                        summary.added_users.push(name.to_owned());
                    } else {
                        trace!(user = name, "user exists, keeping current entry");
                    }
                }
                None => trace!(user = name, "user not in source"),
            }
        }

        for ctx in selected {
            if self.put_context(ctx.clone()).is_some() {
                trace!(context = %ctx.name, "replaced context");
            }
            summary.contexts += 1;
        }

        debug!(
            contexts = summary.contexts,
            clusters = ?summary.added_clusters,
            users = ?summary.added_users,
            "merged contexts"
        );
        Ok(summary)
    }

    /// import from the file at `path` and save
    pub fn import_file<T: AsRef<Path>>(
        &mut self,
        path: T,
        name: Option<&str>,
    ) -> Result<ImportSummary, ConfigError> {
        let source = KubeConfig::from_file(path)?;
        let summary = self.import_from(&source, name)?;
        self.save()?;
        Ok(summary)
    }

    /// Standalone config holding one context and whatever cluster and user it
    /// resolves to. The context becomes the current one.
    pub fn export_context(&self, name: &str) -> Result<KubeConfig, ConfigError> {
        let context = self
            .find_context(name)
            .ok_or_else(|| ConfigError::context_not_found(name))?;

        let mut exported = KubeConfig {
            current_context: Some(name.to_owned()),
            ..Default::default()
        };
        if let Some(cluster) = self.find_cluster(&context.context.cluster) {
            exported.clusters.push(cluster.clone());
        }
        if let Some(user) = self.find_user(&context.context.user) {
            exported.users.push(user.clone());
        }
        exported.contexts.push(context.clone());

        Ok(exported)
    }

    /// Export to `path`, overwriting it without backup.
    /// `clusters`/`users` are left out when the context does not resolve them.
    pub fn export_file<T: AsRef<Path>>(&self, path: T, name: &str) -> Result<(), ConfigError> {
        let exported = self.export_context(name)?;
        debug!(context = name, path = %path.as_ref().display(), "exporting context");

        let document: Mapping = match serde_yaml::to_value(&exported)? {
            Value::Mapping(map) => map
                .into_iter()
                .filter(|(key, value)| !is_empty_section(key, value))
                .collect(),
            _ => Mapping::new(),
        };

        let file = File::create(path)?;
        Ok(serde_yaml::to_writer(file, &document)?)
    }

    pub fn switch_context(&mut self, name: &str) -> Result<(), ConfigError> {
        if self.find_context(name).is_none() {
            return Err(ConfigError::context_not_found(name));
        }
        self.current_context = Some(name.to_owned());
        Ok(())
    }

    /// switch and save
    pub fn switch(&mut self, name: &str) -> Result<(), ConfigError> {
        self.switch_context(name)?;
        self.save()
    }
}

fn is_empty_section(key: &Value, value: &Value) -> bool {
    matches!(key.as_str(), Some("clusters") | Some("users"))
        && value.as_sequence().is_some_and(|entries| entries.is_empty())
}

#[cfg(test)]
mod test {

    use crate::{Cluster, ClusterDetail, ConfigError, Context, ContextDetail, KubeConfig, User};

    fn cluster(name: &str, server: &str) -> Cluster {
        Cluster {
            name: name.to_owned(),
            cluster: ClusterDetail {
                server: server.to_owned(),
                ..Default::default()
            },
        }
    }

    fn user(name: &str, token: &str) -> User {
        let mut user = User {
            name: name.to_owned(),
            user: Default::default(),
        };
        user.user.token = Some(token.to_owned());
        user
    }

    fn context(name: &str, cluster: &str, user: &str) -> Context {
        Context {
            name: name.to_owned(),
            context: ContextDetail {
                cluster: cluster.to_owned(),
                user: user.to_owned(),
                ..Default::default()
            },
        }
    }

    fn dev_source() -> KubeConfig {
        let mut source = KubeConfig::default();
        source.clusters.push(cluster("c1", "https://a"));
        source.users.push(user("u1", "t"));
        source.contexts.push(context("dev", "c1", "u1"));
        source
    }

    #[test]
    fn test_list_contexts_marks_current() {
        let mut config = KubeConfig::default();
        config.contexts.push(context("dev", "c1", "u1"));
        config.contexts.push(context("prod", "c2", "u2"));
        config.current_context = Some("prod".to_owned());

        assert_eq!(
            config.list_contexts(),
            vec!["  dev: 'u1' @ 'c1'", "* prod: 'u2' @ 'c2'"]
        );
    }

    #[test]
    fn test_list_contexts_without_current() {
        let mut config = KubeConfig::default();
        config.contexts.push(context("dev", "", "u1"));
        config.current_context = Some("gone".to_owned());

        let lines = config.list_contexts();
        assert_eq!(lines, vec!["  dev: 'u1' @ ''"]);
        assert!(lines.iter().all(|line| !line.starts_with('*')));

        config.current_context = None;
        assert_eq!(config.list_contexts(), vec!["  dev: 'u1' @ ''"]);
    }

    #[test]
    fn test_list_users_and_clusters() {
        let mut config = KubeConfig::default();
        config.clusters.push(cluster("c1", "https://a"));
        config.clusters.push(cluster("c2", ""));
        config.users.push(user("u1", "t"));
        config.users.push(user("u2", "t"));

        assert_eq!(config.list_clusters(), vec!["c1 https://a", "c2 "]);
        assert_eq!(config.list_users(), vec!["u1", "u2"]);
    }

    #[test]
    fn test_import_into_empty() {
        //given
        let source = dev_source();
        let mut config = KubeConfig::default();

        //when
        let summary = config.import_from(&source, None).expect("import");

        //then
        assert_eq!(summary.contexts, 1);
        assert_eq!(summary.added_clusters, vec!["c1"]);
        assert_eq!(summary.added_users, vec!["u1"]);
        assert_eq!(config.clusters, source.clusters);
        assert_eq!(config.users, source.users);
        assert_eq!(config.contexts, source.contexts);
        assert_eq!(config.list_contexts(), vec!["  dev: 'u1' @ 'c1'"]);
    }

    #[test]
    fn test_import_twice_is_idempotent() {
        let source = dev_source();
        let mut config = KubeConfig::default();

        config.import_from(&source, Some("dev")).expect("first");
        let after_first = config.clone();
        let summary = config.import_from(&source, Some("dev")).expect("second");

        assert_eq!(summary.contexts, 1);
        assert!(summary.added_clusters.is_empty());
        assert!(summary.added_users.is_empty());
        assert_eq!(config, after_first);
    }

    #[test]
    fn test_import_keeps_existing_cluster_and_user() {
        //given
        let mut config = KubeConfig::default();
        config.clusters.push(cluster("c1", "https://original"));
        config.users.push(user("u1", "original"));

        let mut source = dev_source();
        source.clusters[0].cluster.server = "https://other".to_owned();

        //when
        config.import_from(&source, None).expect("import");

        //then
        assert_eq!(config.clusters.len(), 1);
        assert_eq!(config.clusters[0].cluster.server, "https://original");
        assert_eq!(config.users[0].user.token.as_deref(), Some("original"));
    }

    #[test]
    fn test_import_overwrites_context() {
        //given
        let mut config = KubeConfig::default();
        config.contexts.push(context("first", "c0", "u0"));
        config.contexts.push(context("dev", "old", "old"));
        config.contexts.push(context("last", "c0", "u0"));

        //when
        let source = dev_source();
        config.import_from(&source, None).expect("import");

        //then
        assert_eq!(config.contexts.len(), 3);
        assert_eq!(config.contexts[1], source.contexts[0]);
        assert_eq!(config.contexts[0].name, "first");
        assert_eq!(config.contexts[2].name, "last");
    }

    #[test]
    fn test_import_only_named_context() {
        let mut source = dev_source();
        source.clusters.push(cluster("c2", "https://b"));
        source.contexts.push(context("prod", "c2", "missing"));
        let mut config = KubeConfig::default();

        let summary = config.import_from(&source, Some("prod")).expect("import");

        assert_eq!(summary.contexts, 1);
        assert_eq!(summary.added_clusters, vec!["c2"]);
        assert!(summary.added_users.is_empty());
        assert_eq!(config.list_clusters(), vec!["c2 https://b"]);
        assert!(config.users.is_empty());
        assert_eq!(config.list_contexts(), vec!["  prod: 'missing' @ 'c2'"]);
    }

    #[test]
    fn test_import_missing_context_changes_nothing() {
        let source = dev_source();
        let mut config = KubeConfig::default();

        let result = config.import_from(&source, Some("nope"));

        assert!(matches!(
            result,
            Err(ConfigError::ContextNotFound { ref name, file: None }) if name == "nope"
        ));
        assert_eq!(config, KubeConfig::default());
    }

    #[test]
    fn test_export_context() {
        //given
        let mut config = dev_source();
        config.clusters.push(cluster("c2", "https://b"));
        config.users.push(user("u2", "t2"));
        config.contexts.push(context("prod", "c2", "u2"));
        config.current_context = Some("prod".to_owned());

        //when
        let exported = config.export_context("dev").expect("export");

        //then
        assert_eq!(exported.api_version, "v1");
        assert_eq!(exported.kind, "Config");
        assert!(exported.preferences.is_empty());
        assert_eq!(exported.current_context.as_deref(), Some("dev"));
        assert_eq!(exported.clusters, vec![cluster("c1", "https://a")]);
        assert_eq!(exported.users, vec![user("u1", "t")]);
        assert_eq!(exported.contexts, vec![context("dev", "c1", "u1")]);
    }

    #[test]
    fn test_export_dangling_references() {
        let mut config = KubeConfig::default();
        config.contexts.push(context("dev", "c1", "u1"));

        let exported = config.export_context("dev").expect("export");

        assert!(exported.clusters.is_empty());
        assert!(exported.users.is_empty());
        assert_eq!(exported.contexts.len(), 1);
        assert_eq!(exported.list_contexts(), vec!["* dev: 'u1' @ 'c1'"]);
    }

    #[test]
    fn test_export_missing_context() {
        let config = dev_source();
        let result = config.export_context("prod");
        assert!(matches!(result, Err(ConfigError::ContextNotFound { .. })));
    }

    #[test]
    fn test_switch_context() {
        let mut config = dev_source();
        config.contexts.push(context("prod", "c1", "u1"));
        config.current_context = Some("dev".to_owned());

        config.switch_context("prod").expect("switch");
        assert_eq!(config.current_context().map(|c| c.name.as_str()), Some("prod"));

        let result = config.switch_context("nonexistent");
        assert!(matches!(result, Err(ConfigError::ContextNotFound { .. })));
        assert_eq!(config.current_context.as_deref(), Some("prod"));
    }
}
