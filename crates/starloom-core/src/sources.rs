//! Content sources: the base resources directory followed by plugins.
//!
//! A source is a directory whose `data/` subdirectory holds data files. A
//! plugin is a source found under `<config>/plugins` or one of the
//! configured plugin directories, optionally described by a `plugin.txt`
//! manifest. Load order is base resources, then enabled plugins in the
//! configured order. Within a source, files load in alphabetical order,
//! descending into subdirectories where they sort.

use std::path::{Path, PathBuf};

use starloom_data::DataFile;

use crate::config::EngineConfig;

/// Extension of data files.
const DATA_EXTENSION: &str = "txt";

/// A plugin's `plugin.txt`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PluginManifest {
    /// Display name.
    pub name: String,
    /// Free-text description.
    pub about: String,
    /// Version string.
    pub version: String,
}

impl PluginManifest {
    /// Read a manifest. Unknown keys are ignored.
    pub fn load(path: &Path) -> Option<Self> {
        let file = match DataFile::load(path) {
            Ok(file) => file,
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "unreadable plugin manifest");
                return None;
            }
        };
        let mut manifest = Self::default();
        for node in file.nodes() {
            if node.size() < 2 {
                continue;
            }
            let value = node.token(1).to_owned();
            match node.key() {
                "name" => manifest.name = value,
                "about" => manifest.about = value,
                "version" => manifest.version = value,
                _ => {}
            }
        }
        Some(manifest)
    }
}

/// One directory of content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    /// Plugin directory name, or `resources` for the base game.
    pub name: String,
    /// The source directory (the parent of `data/`).
    pub root: PathBuf,
    /// The plugin manifest, if there was one.
    pub manifest: Option<PluginManifest>,
}

impl Source {
    /// A source with no manifest.
    pub fn new(name: &str, root: &Path) -> Self {
        Self {
            name: name.to_owned(),
            root: root.to_path_buf(),
            manifest: None,
        }
    }

    /// Every data file in this source, in load order.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if a directory cannot be listed. A source with
    /// no `data/` directory simply has no files.
    pub fn data_files(&self) -> std::io::Result<Vec<PathBuf>> {
        let data = self.root.join("data");
        let mut files = Vec::new();
        if data.is_dir() {
            collect_files(&data, &mut files)?;
        }
        Ok(files)
    }
}

fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) -> std::io::Result<()> {
    let mut entries = std::fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<Vec<_>, _>>()?;
    entries.sort();
    for path in entries {
        if path.is_dir() {
            collect_files(&path, out)?;
        } else if path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case(DATA_EXTENSION))
        {
            out.push(path);
        }
    }
    Ok(())
}

/// Every source to load, in order: the base resources, then each enabled
/// plugin.
///
/// # Errors
///
/// Returns an I/O error if a plugin directory exists but cannot be listed.
pub fn discover(config: &EngineConfig, config_dir: &Path) -> std::io::Result<Vec<Source>> {
    let mut sources = vec![Source::new("resources", &config.resources)];

    let mut roots = vec![config_dir.join("plugins")];
    roots.extend(config.plugin_dirs.iter().cloned());
    let mut found: Vec<Source> = Vec::new();
    for root in roots.iter().filter(|r| r.is_dir()) {
        let mut dirs = std::fs::read_dir(root)?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<Result<Vec<_>, _>>()?;
        dirs.sort();
        for dir in dirs.into_iter().filter(|d| d.is_dir()) {
            let name = dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            if found.iter().any(|s| s.name == name) {
                tracing::warn!(plugin = %name, path = %dir.display(), "duplicate plugin ignored");
                continue;
            }
            let manifest_path = dir.join("plugin.txt");
            let manifest = if manifest_path.is_file() {
                PluginManifest::load(&manifest_path)
            } else {
                None
            };
            found.push(Source {
                name,
                root: dir,
                manifest,
            });
        }
    }

    if config.plugins.is_empty() {
        found.sort_by(|a, b| a.name.cmp(&b.name));
        sources.extend(found);
    } else {
        for wanted in &config.plugins {
            if let Some(index) = found.iter().position(|s| &s.name == wanted) {
                sources.push(found.swap_remove(index));
            } else {
                tracing::warn!(plugin = %wanted, "enabled plugin not found");
            }
        }
    }

    tracing::info!(count = sources.len(), "content sources discovered");
    Ok(sources)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn scratch(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "starloom_sources_{tag}_{}_{:?}",
            std::process::id(),
            std::thread::current().id(),
        ));
        std::fs::remove_dir_all(&dir).ok();
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn touch(path: &Path, text: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, text).unwrap();
    }

    #[test]
    fn files_load_alphabetically_depth_first() {
        let dir = scratch("order");
        touch(&dir.join("data/b.txt"), "");
        touch(&dir.join("data/a/z.txt"), "");
        touch(&dir.join("data/c.txt"), "");
        touch(&dir.join("data/notes.md"), "");
        let files = Source::new("x", &dir).data_files().unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.strip_prefix(dir.join("data")).unwrap().to_path_buf())
            .collect();
        assert_eq!(
            names,
            [PathBuf::from("a/z.txt"), PathBuf::from("b.txt"), PathBuf::from("c.txt")]
        );
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn plugins_follow_configured_order() {
        let dir = scratch("plugins");
        touch(&dir.join("plugins/alpha/data/a.txt"), "");
        touch(&dir.join("plugins/beta/data/b.txt"), "");
        touch(&dir.join("plugins/beta/plugin.txt"), "name \"Beta Plugin\"\nversion 2\n");

        let mut config = EngineConfig::default();
        config.resources = dir.join("resources");
        let all = discover(&config, &dir).unwrap();
        let names: Vec<&str> = all.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["resources", "alpha", "beta"]);
        assert_eq!(all[2].manifest.as_ref().unwrap().name, "Beta Plugin");

        config.plugins = vec!["beta".to_owned(), "alpha".to_owned(), "gamma".to_owned()];
        let ordered = discover(&config, &dir).unwrap();
        let names: Vec<&str> = ordered.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["resources", "beta", "alpha"]);
        std::fs::remove_dir_all(&dir).ok();
    }
}
