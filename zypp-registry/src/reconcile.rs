//! `refreshService`: reconcile a service's repo list against the
//! registry (spec §4.7, §9 "service-plugin RPC is out of scope... a
//! trait the caller implements").

use zypp_core::{Alias, RepoInfo, ServiceInfo, Timestamp};

use crate::plugin::PluginEvent;
use crate::repo_store::{RegistryError, RepoRegistry};

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("listing repositories for the service failed: {0}")]
    Backend(String),
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// The RIS-equivalent indexing endpoint: given a service, return the
/// repositories it currently advertises. The real index-file fetch and
/// parse are external collaborators (spec §1).
pub trait ServiceBackend {
    fn list_repos(&self, service: &ServiceInfo) -> Result<Vec<RepoInfo>, ServiceError>;
}

/// Reconcile `service`'s advertised repos against the registry: add
/// newly-advertised repos (respecting the service's default enablement
/// unless the user explicitly overrode it), update repos still
/// advertised, and remove repos the service no longer advertises and the
/// user never took over. Returns the plugin events the caller should
/// forward.
pub fn refresh_service(
    service: &mut ServiceInfo,
    backend: &dyn ServiceBackend,
    registry: &mut RepoRegistry,
    now: Timestamp,
) -> Result<Vec<PluginEvent>, ServiceError> {
    let advertised = backend.list_repos(service)?;
    let mut still_advertised = Vec::with_capacity(advertised.len());
    let mut events = Vec::new();

    for mut repo in advertised {
        let alias = repo.alias().clone();
        still_advertised.push(alias.clone());

        if service.user_disabled(&alias) {
            repo.set_enabled(false);
        } else if !service.user_enabled(&alias) {
            // Neither explicitly enabled nor disabled by the user: follow
            // the service's own default for this repo.
            repo.set_enabled(true);
        }

        if registry.contains(&alias) {
            registry.modify(&alias, repo, now)?;
        } else {
            registry.add(repo, now)?;
            events.push(PluginEvent::PackageSetChanged { alias: alias.clone() });
        }
        service.set_repo_state(alias, true);
    }

    let previously_known: Vec<Alias> = service.known_repos().cloned().collect();
    for alias in previously_known {
        if still_advertised.contains(&alias) {
            continue;
        }
        if registry.contains(&alias) && !service.user_enabled(&alias) {
            registry.remove(&alias, now)?;
            events.push(PluginEvent::PackageSetChanged { alias: alias.clone() });
        }
    }

    service.touch(now);
    if !events.is_empty() {
        events.push(PluginEvent::ServicesChanged {
            service: service.alias().clone(),
        });
    }
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use zypp_core::{MirroredOrigin, ServiceType, Url};

    fn repo(alias: &str) -> RepoInfo {
        RepoInfo::new(
            Alias::new(alias),
            vec![MirroredOrigin::new(
                Url::parse(&format!("http://example.org/{alias}")).unwrap(),
                [],
            )],
        )
    }

    struct FixedBackend(Vec<RepoInfo>);
    impl ServiceBackend for FixedBackend {
        fn list_repos(&self, _service: &ServiceInfo) -> Result<Vec<RepoInfo>, ServiceError> {
            Ok(self.0.clone())
        }
    }

    fn open_registry(dir: &std::path::Path) -> RepoRegistry {
        let (registry, _rx) = RepoRegistry::open(dir.join("repos.d"), dir.join("history")).unwrap();
        registry
    }

    #[test]
    fn newly_advertised_repos_are_added() {
        let dir = tempfile::tempdir().unwrap();
        let mut registry = open_registry(dir.path());
        let mut service = ServiceInfo::new(
            Alias::new("svc"),
            Url::parse("https://example.org/index").unwrap(),
            ServiceType::Ris,
        );
        let backend = FixedBackend(vec![repo("factory")]);

        refresh_service(&mut service, &backend, &mut registry, 1).unwrap();
        assert!(registry.contains(&Alias::new("factory")));
    }

    #[test]
    fn repos_dropped_by_the_service_are_removed_unless_user_took_over() {
        let dir = tempfile::tempdir().unwrap();
        let mut registry = open_registry(dir.path());
        let mut service = ServiceInfo::new(
            Alias::new("svc"),
            Url::parse("https://example.org/index").unwrap(),
            ServiceType::Ris,
        );
        let backend = FixedBackend(vec![repo("factory"), repo("oss"), repo("non-oss")]);
        refresh_service(&mut service, &backend, &mut registry, 1).unwrap();

        service.remember_user_enabled(Alias::new("oss"));
        // The service stops advertising both "oss" and "non-oss"; only
        // "oss" was taken over by the user.
        let backend = FixedBackend(vec![repo("factory")]);
        refresh_service(&mut service, &backend, &mut registry, 2).unwrap();

        assert!(registry.contains(&Alias::new("factory")));
        // dropped by the service and never taken over: removed
        assert!(!registry.contains(&Alias::new("non-oss")));
        // dropped by the service but taken over by the user: untouched
        assert!(registry.contains(&Alias::new("oss")));
    }

    #[test]
    fn user_disabled_repos_stay_disabled_on_refresh() {
        let dir = tempfile::tempdir().unwrap();
        let mut registry = open_registry(dir.path());
        let mut service = ServiceInfo::new(
            Alias::new("svc"),
            Url::parse("https://example.org/index").unwrap(),
            ServiceType::Ris,
        );
        service.remember_user_disabled(Alias::new("factory"));
        let backend = FixedBackend(vec![repo("factory")]);
        refresh_service(&mut service, &backend, &mut registry, 1).unwrap();

        let stored = registry.get(&Alias::new("factory")).unwrap();
        assert!(!stored.enabled());
    }
}
