//! INI encode/decode for [`RepoInfo`] and [`ServiceInfo`] (spec §4.7:
//! "INI-like files... each holds one or more `[alias]` sections").

use ini::{Ini, Properties};

use zypp_core::{
    Alias, GpgCheck, GpgCheckTriad, MirroredOrigin, RepoInfo, RepoType, ServiceInfo, ServiceType, Url,
};

#[derive(Debug, thiserror::Error)]
pub enum IniFormatError {
    #[error("section {0:?} has no baseurl entries")]
    NoBaseUrl(String),
    #[error("section {0:?} has an unparseable url {1:?}")]
    BadUrl(String, String),
    #[error("section {0:?} has an unparseable priority {1:?}")]
    BadPriority(String, String),
}

fn bool_str(b: bool) -> &'static str {
    if b {
        "1"
    } else {
        "0"
    }
}

fn gpg_str(g: GpgCheck) -> &'static str {
    match g {
        GpgCheck::On => "1",
        GpgCheck::Off => "0",
        GpgCheck::Default => "",
    }
}

/// Serialize one repository into a `[alias]` section of `ini`, replacing
/// any section already present under that alias.
pub fn write_repo_section(ini: &mut Ini, repo: &RepoInfo) {
    let alias = repo.alias().as_str().to_string();
    ini.delete(Some(alias.as_str()));

    ini.with_section(Some(alias.clone()))
        .set("name", repo.name())
        .set("enabled", bool_str(repo.enabled()))
        .set("autorefresh", bool_str(repo.autorefresh()))
        .set("path", repo.path())
        .set("type", repo.repo_type().as_str())
        .set("priority", repo.priority().to_string())
        .set("keeppackages", bool_str(repo.keep_packages()));

    // baseurl is multi-valued and ordered (authority first, then mirrors),
    // so each one is appended rather than set.
    for url in repo.origins().iter().flat_map(MirroredOrigin::iter) {
        ini.with_section(Some(alias.clone())).add("baseurl", url.as_str());
    }

    let gpg = repo.gpg();
    let mut setter = ini.with_section(Some(alias.clone()));
    if !gpg_str(gpg.gpgcheck).is_empty() {
        setter = setter.set("gpgcheck", gpg_str(gpg.gpgcheck));
    }
    if !gpg_str(gpg.repo_gpgcheck).is_empty() {
        setter = setter.set("repo_gpgcheck", gpg_str(gpg.repo_gpgcheck));
    }
    if !gpg_str(gpg.pkg_gpgcheck).is_empty() {
        setter.set("pkg_gpgcheck", gpg_str(gpg.pkg_gpgcheck));
    }
}

/// Parse one `[alias]` section into a [`RepoInfo`].
pub fn read_repo_section(alias: &str, section: &Properties) -> Result<RepoInfo, IniFormatError> {
    let mut urls = Vec::new();
    for raw in section.get_all("baseurl") {
        let url = Url::parse(raw).map_err(|_| IniFormatError::BadUrl(alias.to_string(), raw.to_string()))?;
        urls.push(url);
    }
    if urls.is_empty() {
        return Err(IniFormatError::NoBaseUrl(alias.to_string()));
    }
    let origin = MirroredOrigin::new(urls.remove(0), urls);

    let mut repo = RepoInfo::new(Alias::new(alias), vec![origin]);
    if let Some(name) = section.get("name") {
        repo.set_name(name);
    }
    repo.set_enabled(section.get("enabled").map(is_truthy).unwrap_or(true));
    repo.set_autorefresh(section.get("autorefresh").map(is_truthy).unwrap_or(false));
    if let Some(path) = section.get("path") {
        repo.set_path(path);
    }
    repo.set_repo_type(section.get("type").map(RepoType::parse).unwrap_or(RepoType::None));
    if let Some(priority) = section.get("priority") {
        let priority: i32 = priority
            .parse()
            .map_err(|_| IniFormatError::BadPriority(alias.to_string(), priority.to_string()))?;
        repo.set_priority(priority);
    }
    repo.set_keep_packages(section.get("keeppackages").map(is_truthy).unwrap_or(false));
    repo.set_gpg(GpgCheckTriad {
        gpgcheck: section.get("gpgcheck").map(GpgCheck::parse).unwrap_or_default(),
        repo_gpgcheck: section.get("repo_gpgcheck").map(GpgCheck::parse).unwrap_or_default(),
        pkg_gpgcheck: section.get("pkg_gpgcheck").map(GpgCheck::parse).unwrap_or_default(),
    });

    Ok(repo)
}

fn is_truthy(s: &str) -> bool {
    matches!(s, "1" | "true" | "yes" | "on")
}

/// Serialize one service into a `[alias]` section.
pub fn write_service_section(ini: &mut Ini, service: &ServiceInfo) {
    let alias = service.alias().as_str().to_string();
    ini.delete(Some(alias.as_str()));
    ini.with_section(Some(alias))
        .set("url", service.url().as_str())
        .set("type", service.service_type().as_str())
        .set("ttl", service.ttl().to_string());
}

pub fn read_service_section(alias: &str, section: &Properties) -> Result<ServiceInfo, IniFormatError> {
    let url = section
        .get("url")
        .ok_or_else(|| IniFormatError::BadUrl(alias.to_string(), String::new()))?;
    let url = Url::parse(url).map_err(|_| IniFormatError::BadUrl(alias.to_string(), url.to_string()))?;
    let service_type = section.get("type").map(ServiceType::parse).unwrap_or(ServiceType::None);
    let mut service = ServiceInfo::new(Alias::new(alias), url, service_type);
    if let Some(ttl) = section.get("ttl").and_then(|t| t.parse().ok()) {
        service.set_ttl(ttl);
    }
    Ok(service)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_repo() -> RepoInfo {
        let mut repo = RepoInfo::new(
            Alias::new("factory"),
            vec![MirroredOrigin::new(
                Url::parse("http://a.example.org/repo").unwrap(),
                [Url::parse("http://b.example.org/repo").unwrap()],
            )],
        );
        repo.set_priority(10);
        repo.set_autorefresh(true);
        repo
    }

    #[test]
    fn repo_round_trips_through_ini() {
        let mut ini = Ini::new();
        write_repo_section(&mut ini, &sample_repo());
        let section = ini.section(Some("factory")).unwrap();
        let parsed = read_repo_section("factory", section).unwrap();
        assert_eq!(parsed.alias().as_str(), "factory");
        assert_eq!(parsed.priority(), 10);
        assert!(parsed.autorefresh());
        assert_eq!(parsed.origins()[0].mirrors().len(), 1);
    }

    #[test]
    fn missing_baseurl_is_rejected() {
        let mut ini = Ini::new();
        ini.with_section(Some("broken")).set("name", "broken");
        let section = ini.section(Some("broken")).unwrap();
        assert!(read_repo_section("broken", section).is_err());
    }

    #[test]
    fn service_round_trips_through_ini() {
        let service = ServiceInfo::new(
            Alias::new("svc"),
            Url::parse("https://example.org/index").unwrap(),
            ServiceType::Ris,
        );
        let mut ini = Ini::new();
        write_service_section(&mut ini, &service);
        let section = ini.section(Some("svc")).unwrap();
        let parsed = read_service_section("svc", section).unwrap();
        assert_eq!(parsed.service_type(), ServiceType::Ris);
    }
}
