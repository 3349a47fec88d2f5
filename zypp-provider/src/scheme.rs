//! Effective-scheme mapping: a configurable alias table collapsing
//! related schemes onto a single queue (spec §4.3.1).

use std::collections::HashMap;

/// Maps a URL scheme name (e.g. `"https"`) onto the scheme whose queue
/// and worker pool actually serve it (e.g. `"http"`).
#[derive(Clone, Debug)]
pub struct EffectiveSchemeMap {
    aliases: HashMap<String, String>,
}

impl Default for EffectiveSchemeMap {
    fn default() -> Self {
        let mut aliases = HashMap::new();
        aliases.insert("https".to_string(), "http".to_string());
        aliases.insert("cifs".to_string(), "smb".to_string());
        aliases.insert("cd".to_string(), "disc".to_string());
        aliases.insert("dvd".to_string(), "disc".to_string());
        aliases.insert("file".to_string(), "dir".to_string());
        Self { aliases }
    }
}

impl EffectiveSchemeMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn empty() -> Self {
        Self {
            aliases: HashMap::new(),
        }
    }

    pub fn alias(&mut self, scheme: impl Into<String>, effective: impl Into<String>) {
        self.aliases.insert(scheme.into(), effective.into());
    }

    /// The effective scheme a `scheme` name is served by. Schemes not
    /// present in the alias map are their own effective scheme.
    pub fn effective<'a>(&'a self, scheme: &'a str) -> &'a str {
        self.aliases.get(scheme).map(String::as_str).unwrap_or(scheme)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_aliases_collapse_onto_their_target() {
        let map = EffectiveSchemeMap::default();
        assert_eq!(map.effective("https"), "http");
        assert_eq!(map.effective("cifs"), "smb");
        assert_eq!(map.effective("cd"), "disc");
        assert_eq!(map.effective("dvd"), "disc");
        assert_eq!(map.effective("file"), "dir");
    }

    #[test]
    fn unmapped_schemes_are_their_own_effective_scheme() {
        let map = EffectiveSchemeMap::default();
        assert_eq!(map.effective("nfs"), "nfs");
    }

    #[test]
    fn overrides_replace_the_default_mapping() {
        let mut map = EffectiveSchemeMap::empty();
        map.alias("https", "tor-http");
        assert_eq!(map.effective("https"), "tor-http");
        assert_eq!(map.effective("http"), "http");
    }
}
