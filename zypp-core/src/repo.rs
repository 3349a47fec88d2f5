use std::path::PathBuf;

use crate::{Alias, MirroredOrigin};

/// Repository format, per spec §3.2/§6.2.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RepoType {
    Rpmmd,
    Yast2,
    Plaindir,
    None,
}

impl RepoType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Rpmmd => "rpmmd",
            Self::Yast2 => "yast2",
            Self::Plaindir => "plaindir",
            Self::None => "NONE",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "rpmmd" => Self::Rpmmd,
            "yast2" => Self::Yast2,
            "plaindir" => Self::Plaindir,
            _ => Self::None,
        }
    }
}

/// A tristate gpg-check setting: `on`, `off`, or `default` (inherit),
/// spec §6.2.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum GpgCheck {
    On,
    Off,
    #[default]
    Default,
}

impl GpgCheck {
    pub fn parse(s: &str) -> Self {
        match s {
            "1" | "on" | "true" => Self::On,
            "0" | "off" | "false" => Self::Off,
            _ => Self::Default,
        }
    }
}

/// The gpgcheck/repo_gpgcheck/pkg_gpgcheck triad, spec §3.2/§6.2.
#[derive(Clone, Copy, Debug, Default)]
pub struct GpgCheckTriad {
    pub gpgcheck: GpgCheck,
    pub repo_gpgcheck: GpgCheck,
    pub pkg_gpgcheck: GpgCheck,
}

/// In-memory repository definition (spec §3.2 table).
///
/// Callers receive [`RepoInfo`] by value (spec §3.4: "the registry
/// exclusively owns records in memory; callers receive by-value
/// snapshots").
#[derive(Clone, Debug)]
pub struct RepoInfo {
    alias: Alias,
    name: String,
    enabled: bool,
    autorefresh: bool,
    repo_type: RepoType,
    origins: Vec<MirroredOrigin>,
    path: String,
    priority: i32,
    keep_packages: bool,
    gpg: GpgCheckTriad,
    metadata_path: Option<PathBuf>,
    packages_path: Option<PathBuf>,
    file_of_origin: Option<PathBuf>,
    /// Refresh-delay policy, in minutes, used by §4.5 `checkIfToRefresh`.
    pub refresh_delay_minutes: u32,
}

impl RepoInfo {
    pub fn new(alias: Alias, origins: Vec<MirroredOrigin>) -> Self {
        let name = alias.to_string();
        Self {
            alias,
            name,
            enabled: true,
            autorefresh: false,
            repo_type: RepoType::None,
            origins,
            path: "/".to_string(),
            priority: 99,
            keep_packages: false,
            gpg: GpgCheckTriad::default(),
            metadata_path: None,
            packages_path: None,
            file_of_origin: None,
            refresh_delay_minutes: 90,
        }
    }

    pub fn alias(&self) -> &Alias {
        &self.alias
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn autorefresh(&self) -> bool {
        self.autorefresh
    }

    pub fn set_autorefresh(&mut self, autorefresh: bool) {
        self.autorefresh = autorefresh;
    }

    pub fn repo_type(&self) -> RepoType {
        self.repo_type
    }

    pub fn set_repo_type(&mut self, repo_type: RepoType) {
        self.repo_type = repo_type;
    }

    pub fn origins(&self) -> &[MirroredOrigin] {
        &self.origins
    }

    /// Invariant 3.3.2: a repo with `type != none` must have at least one
    /// origin with a non-empty URL before refresh or fetch.
    pub fn has_usable_origin(&self) -> bool {
        self.repo_type == RepoType::None || !self.origins.is_empty()
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn set_path(&mut self, path: impl Into<String>) {
        self.path = path.into();
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn set_priority(&mut self, priority: i32) {
        self.priority = priority;
    }

    pub fn keep_packages(&self) -> bool {
        self.keep_packages
    }

    pub fn set_keep_packages(&mut self, keep: bool) {
        self.keep_packages = keep;
    }

    pub fn gpg(&self) -> GpgCheckTriad {
        self.gpg
    }

    pub fn set_gpg(&mut self, gpg: GpgCheckTriad) {
        self.gpg = gpg;
    }

    pub fn metadata_path(&self) -> Option<&PathBuf> {
        self.metadata_path.as_ref()
    }

    pub fn set_metadata_path(&mut self, path: PathBuf) {
        self.metadata_path = Some(path);
    }

    pub fn packages_path(&self) -> Option<&PathBuf> {
        self.packages_path.as_ref()
    }

    pub fn set_packages_path(&mut self, path: PathBuf) {
        self.packages_path = Some(path);
    }

    pub fn file_of_origin(&self) -> Option<&PathBuf> {
        self.file_of_origin.as_ref()
    }

    pub fn set_file_of_origin(&mut self, path: PathBuf) {
        self.file_of_origin = Some(path);
    }
}

impl PartialEq for RepoInfo {
    /// Invariant 3.3.1: two `RepoInfo`s are equal iff their aliases are
    /// equal.
    fn eq(&self, other: &Self) -> bool {
        self.alias == other.alias
    }
}
impl Eq for RepoInfo {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Url;

    fn origin(url: &str) -> MirroredOrigin {
        MirroredOrigin::new(Url::parse(url).unwrap(), [])
    }

    #[test]
    fn equality_is_alias_only() {
        let mut a = RepoInfo::new(Alias::new("repo"), vec![origin("http://a/repo")]);
        let b = RepoInfo::new(Alias::new("repo"), vec![origin("http://b/repo")]);
        a.set_priority(1);
        assert_eq!(a, b);
    }

    #[test]
    fn none_type_does_not_need_an_origin() {
        let mut info = RepoInfo::new(Alias::new("empty"), vec![]);
        info.set_repo_type(RepoType::None);
        assert!(info.has_usable_origin());
        info.set_repo_type(RepoType::Rpmmd);
        assert!(!info.has_usable_origin());
    }
}
