use std::collections::{HashMap, HashSet};

use crate::{Alias, Timestamp, Url};

/// Service format, per spec §3.2.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ServiceType {
    Ris,
    Plugin,
    None,
}

impl ServiceType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ris => "ris",
            Self::Plugin => "plugin",
            Self::None => "NONE",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "ris" => Self::Ris,
            "plugin" => Self::Plugin,
            _ => Self::None,
        }
    }
}

/// In-memory service definition (spec §3.2 table).
#[derive(Clone, Debug)]
pub struct ServiceInfo {
    alias: Alias,
    url: Url,
    service_type: ServiceType,
    /// Repos the user explicitly enabled, overriding the service's own
    /// enablement decision on reconciliation (§4.7 `refreshService`).
    enabled_repos: HashSet<Alias>,
    /// Repos the user explicitly disabled.
    disabled_repos: HashSet<Alias>,
    /// Time-to-live, in seconds, before the service is considered stale.
    ttl: u32,
    last_refresh: Option<Timestamp>,
    /// Remembered per-repo state from the last successful reconciliation,
    /// keyed by repo alias.
    repo_states: HashMap<Alias, bool>,
}

impl ServiceInfo {
    pub fn new(alias: Alias, url: Url, service_type: ServiceType) -> Self {
        Self {
            alias,
            url,
            service_type,
            enabled_repos: HashSet::new(),
            disabled_repos: HashSet::new(),
            ttl: 0,
            last_refresh: None,
            repo_states: HashMap::new(),
        }
    }

    pub fn alias(&self) -> &Alias {
        &self.alias
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn service_type(&self) -> ServiceType {
        self.service_type
    }

    pub fn ttl(&self) -> u32 {
        self.ttl
    }

    pub fn set_ttl(&mut self, ttl: u32) {
        self.ttl = ttl;
    }

    pub fn last_refresh(&self) -> Option<Timestamp> {
        self.last_refresh
    }

    pub fn touch(&mut self, now: Timestamp) {
        self.last_refresh = Some(now);
    }

    pub fn is_stale(&self, now: Timestamp) -> bool {
        match self.last_refresh {
            None => true,
            Some(last) => now.saturating_sub(last) >= (self.ttl as Timestamp) * 1000,
        }
    }

    pub fn user_enabled(&self, repo: &Alias) -> bool {
        self.enabled_repos.contains(repo)
    }

    pub fn user_disabled(&self, repo: &Alias) -> bool {
        self.disabled_repos.contains(repo)
    }

    pub fn remember_user_enabled(&mut self, repo: Alias) {
        self.disabled_repos.remove(&repo);
        self.enabled_repos.insert(repo);
    }

    pub fn remember_user_disabled(&mut self, repo: Alias) {
        self.enabled_repos.remove(&repo);
        self.disabled_repos.insert(repo);
    }

    pub fn repo_state(&self, repo: &Alias) -> Option<bool> {
        self.repo_states.get(repo).copied()
    }

    pub fn set_repo_state(&mut self, repo: Alias, enabled: bool) {
        self.repo_states.insert(repo, enabled);
    }

    pub fn known_repos(&self) -> impl Iterator<Item = &Alias> {
        self.repo_states.keys()
    }
}

impl PartialEq for ServiceInfo {
    fn eq(&self, other: &Self) -> bool {
        self.alias == other.alias
    }
}
impl Eq for ServiceInfo {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staleness_respects_ttl() {
        let mut svc = ServiceInfo::new(
            Alias::new("svc"),
            Url::parse("https://example.org/index").unwrap(),
            ServiceType::Ris,
        );
        svc.set_ttl(60);
        assert!(svc.is_stale(1_000));
        svc.touch(1_000);
        assert!(!svc.is_stale(30_000));
        assert!(svc.is_stale(65_000));
    }

    #[test]
    fn user_enable_disable_are_mutually_exclusive() {
        let mut svc = ServiceInfo::new(
            Alias::new("svc"),
            Url::parse("https://example.org/index").unwrap(),
            ServiceType::Ris,
        );
        let repo = Alias::new("repo");
        svc.remember_user_disabled(repo.clone());
        assert!(svc.user_disabled(&repo));
        svc.remember_user_enabled(repo.clone());
        assert!(svc.user_enabled(&repo));
        assert!(!svc.user_disabled(&repo));
    }
}
