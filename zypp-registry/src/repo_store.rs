//! Repository registry: INI-backed persistence for `RepoInfo` records
//! (spec §4.7).

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use ini::Ini;
use log::{debug, info};

use zypp_core::{Alias, RepoInfo, Timestamp};

use crate::history;
use crate::ini_format::{self, IniFormatError};
use crate::plugin::{self, PluginEvent, PluginEventSender};

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("a repository with alias {0:?} already exists")]
    AliasCollision(String),
    #[error("no repository with alias {0:?} is registered")]
    UnknownAlias(String),
    #[error(transparent)]
    Format(#[from] IniFormatError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Owns every known `[alias]` section across a directory of `.repo`
/// files (spec §3.4: the registry exclusively owns records; callers get
/// by-value snapshots via [`RepoRegistry::get`]).
pub struct RepoRegistry {
    known_repos_dir: PathBuf,
    history_path: PathBuf,
    repos: HashMap<Alias, RepoInfo>,
    files: HashMap<Alias, PathBuf>,
    events: PluginEventSender,
}

impl RepoRegistry {
    /// Load every `.repo` file already present under `known_repos_dir`.
    pub fn open(
        known_repos_dir: impl Into<PathBuf>,
        history_path: impl Into<PathBuf>,
    ) -> Result<(Self, crossbeam_channel::Receiver<PluginEvent>), RegistryError> {
        let known_repos_dir = known_repos_dir.into();
        fs::create_dir_all(&known_repos_dir)?;
        let (events, rx) = plugin::channel();

        let mut registry = Self {
            known_repos_dir,
            history_path: history_path.into(),
            repos: HashMap::new(),
            files: HashMap::new(),
            events,
        };
        registry.reload()?;
        Ok((registry, rx))
    }

    fn reload(&mut self) -> Result<(), RegistryError> {
        self.repos.clear();
        self.files.clear();
        for entry in fs::read_dir(&self.known_repos_dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("repo") {
                continue;
            }
            let ini = Ini::load_from_file(&path).map_err(|e| {
                RegistryError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))
            })?;
            for (section_name, props) in ini.iter() {
                let Some(alias) = section_name else { continue };
                let mut repo = ini_format::read_repo_section(alias, props)?;
                repo.set_file_of_origin(path.clone());
                self.files.insert(repo.alias().clone(), path.clone());
                self.repos.insert(repo.alias().clone(), repo);
            }
        }
        Ok(())
    }

    pub fn get(&self, alias: &Alias) -> Option<RepoInfo> {
        self.repos.get(alias).cloned()
    }

    pub fn contains(&self, alias: &Alias) -> bool {
        self.repos.contains_key(alias)
    }

    pub fn all(&self) -> impl Iterator<Item = &RepoInfo> {
        self.repos.values()
    }

    /// Returns a filename in `dir` that does not yet exist, appending
    /// integer suffixes to `basename` until one is free (spec §4.7
    /// `generateNonExistingName`).
    pub fn generate_non_existing_name(dir: &Path, basename: &str) -> String {
        let candidate = format!("{basename}.repo");
        if !dir.join(&candidate).exists() {
            return candidate;
        }
        let mut n = 1u32;
        loop {
            let candidate = format!("{basename}_{n}.repo");
            if !dir.join(&candidate).exists() {
                return candidate;
            }
            n += 1;
        }
    }

    /// Add a repository (spec §4.7 `add`): rejects alias collisions,
    /// writes its file atomically, appends a history entry, and emits
    /// [`PluginEvent::PackageSetChanged`] on success.
    pub fn add(&mut self, mut repo: RepoInfo, now: Timestamp) -> Result<(), RegistryError> {
        if self.repos.contains_key(repo.alias()) {
            return Err(RegistryError::AliasCollision(repo.alias().to_string()));
        }

        let file_name = Self::generate_non_existing_name(&self.known_repos_dir, repo.alias().as_str());
        let path = self.known_repos_dir.join(file_name);
        debug!(target: "registry", "adding repository {} at {}", repo.alias(), path.display());
        repo.set_file_of_origin(path.clone());

        let mut ini = Ini::new();
        ini_format::write_repo_section(&mut ini, &repo);
        atomic_write(&path, &ini)?;

        history::append(&self.history_path, now, "add", repo.alias().as_str(), "")?;
        self.events.emit(PluginEvent::PackageSetChanged {
            alias: repo.alias().clone(),
        });

        info!(target: "registry", "added repository {}", repo.alias());
        self.files.insert(repo.alias().clone(), path);
        self.repos.insert(repo.alias().clone(), repo);
        Ok(())
    }

    /// Remove a repository (spec §4.7 `remove`): strips the `[alias]`
    /// section from its origin file (deleting the file if it was the
    /// only section), appends a history entry. Cache directory removal
    /// is the caller's responsibility (it needs the cache-root config
    /// this crate does not own).
    pub fn remove(&mut self, alias: &Alias, now: Timestamp) -> Result<RepoInfo, RegistryError> {
        let repo = self
            .repos
            .remove(alias)
            .ok_or_else(|| RegistryError::UnknownAlias(alias.to_string()))?;
        let path = self.files.remove(alias).expect("file tracked for every known repo");
        debug!(target: "registry", "removing repository {alias} from {}", path.display());

        let remaining_in_file: Vec<&RepoInfo> = self
            .repos
            .values()
            .filter(|r| self.files.get(r.alias()) == Some(&path))
            .collect();

        if remaining_in_file.is_empty() {
            fs::remove_file(&path)?;
        } else {
            let mut ini = Ini::new();
            for r in remaining_in_file {
                ini_format::write_repo_section(&mut ini, r);
            }
            atomic_write(&path, &ini)?;
        }

        history::append(&self.history_path, now, "remove", alias.as_str(), "")?;
        info!(target: "registry", "removed repository {alias}");
        Ok(repo)
    }

    /// Modify a repository (spec §4.7 `modify`): atomically replaces its
    /// section in place; if the alias itself changed, the new alias must
    /// be unique.
    pub fn modify(&mut self, old_alias: &Alias, mut updated: RepoInfo, now: Timestamp) -> Result<(), RegistryError> {
        if !self.repos.contains_key(old_alias) {
            return Err(RegistryError::UnknownAlias(old_alias.to_string()));
        }
        if updated.alias() != old_alias && self.repos.contains_key(updated.alias()) {
            return Err(RegistryError::AliasCollision(updated.alias().to_string()));
        }

        let path = self.files.get(old_alias).cloned().expect("file tracked for every known repo");
        debug!(target: "registry", "modifying repository {old_alias} (new alias: {})", updated.alias());
        updated.set_file_of_origin(path.clone());

        let siblings: Vec<RepoInfo> = self
            .repos
            .values()
            .filter(|r| r.alias() != old_alias && self.files.get(r.alias()) == Some(&path))
            .cloned()
            .collect();

        let mut ini = Ini::new();
        for sibling in &siblings {
            ini_format::write_repo_section(&mut ini, sibling);
        }
        ini_format::write_repo_section(&mut ini, &updated);
        atomic_write(&path, &ini)?;

        let new_alias = updated.alias().clone();
        self.repos.remove(old_alias);
        self.files.remove(old_alias);
        self.files.insert(new_alias.clone(), path);
        self.repos.insert(new_alias.clone(), updated);

        history::append(&self.history_path, now, "modify", new_alias.as_str(), "")?;
        info!(target: "registry", "modified repository {new_alias}");
        self.events.emit(PluginEvent::PackageSetChanged { alias: new_alias });
        Ok(())
    }
}

fn atomic_write(path: &Path, ini: &Ini) -> std::io::Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    ini.write_to(&mut tmp)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
