//! Service registry: INI-backed persistence for `ServiceInfo` records,
//! mirroring [`crate::repo_store::RepoRegistry`] (spec §4.7).

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use ini::Ini;

use zypp_core::{Alias, ServiceInfo, Timestamp};

use crate::history;
use crate::ini_format;
use crate::repo_store::RegistryError;

pub struct ServiceRegistry {
    known_services_dir: PathBuf,
    history_path: PathBuf,
    services: HashMap<Alias, ServiceInfo>,
}

impl ServiceRegistry {
    pub fn open(known_services_dir: impl Into<PathBuf>, history_path: impl Into<PathBuf>) -> Result<Self, RegistryError> {
        let known_services_dir = known_services_dir.into();
        fs::create_dir_all(&known_services_dir)?;
        let mut registry = Self {
            known_services_dir,
            history_path: history_path.into(),
            services: HashMap::new(),
        };
        registry.reload()?;
        Ok(registry)
    }

    fn reload(&mut self) -> Result<(), RegistryError> {
        self.services.clear();
        for entry in fs::read_dir(&self.known_services_dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("service") {
                continue;
            }
            let ini = Ini::load_from_file(&path).map_err(|e| {
                RegistryError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))
            })?;
            for (section_name, props) in ini.iter() {
                let Some(alias) = section_name else { continue };
                let service = ini_format::read_service_section(alias, props)?;
                self.services.insert(service.alias().clone(), service);
            }
        }
        Ok(())
    }

    pub fn get(&self, alias: &Alias) -> Option<&ServiceInfo> {
        self.services.get(alias)
    }

    pub fn get_mut(&mut self, alias: &Alias) -> Option<&mut ServiceInfo> {
        self.services.get_mut(alias)
    }

    pub fn all(&self) -> impl Iterator<Item = &ServiceInfo> {
        self.services.values()
    }

    pub fn add(&mut self, service: ServiceInfo, now: Timestamp) -> Result<(), RegistryError> {
        if self.services.contains_key(service.alias()) {
            return Err(RegistryError::AliasCollision(service.alias().to_string()));
        }
        self.persist(&service)?;
        history::append(&self.history_path, now, "service-add", service.alias().as_str(), "")?;
        self.services.insert(service.alias().clone(), service);
        Ok(())
    }

    /// Persist an already-registered (possibly just-mutated) service back
    /// to its file, e.g. after [`crate::reconcile::refresh_service`]
    /// updates its enabled/disabled bookkeeping.
    pub fn save(&mut self, alias: &Alias) -> Result<(), RegistryError> {
        let service = self
            .services
            .get(alias)
            .ok_or_else(|| RegistryError::UnknownAlias(alias.to_string()))?
            .clone();
        self.persist(&service)
    }

    fn persist(&self, service: &ServiceInfo) -> Result<(), RegistryError> {
        let path = self.known_services_dir.join(format!("{}.service", service.alias()));
        let mut ini = Ini::new();
        ini_format::write_service_section(&mut ini, service);
        let dir = path.parent().unwrap_or(&self.known_services_dir);
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        ini.write_to(&mut tmp)?;
        tmp.persist(&path).map_err(|e| e.error)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zypp_core::{ServiceType, Url};

    #[test]
    fn add_then_reload_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let known = dir.path().join("services.d");
        let history_path = dir.path().join("history");
        let mut registry = ServiceRegistry::open(&known, &history_path).unwrap();
        let service = ServiceInfo::new(
            Alias::new("openSUSE"),
            Url::parse("https://example.org/index").unwrap(),
            ServiceType::Ris,
        );
        registry.add(service, 1).unwrap();

        let reloaded = ServiceRegistry::open(&known, &history_path).unwrap();
        assert!(reloaded.get(&Alias::new("openSUSE")).is_some());
    }
}
