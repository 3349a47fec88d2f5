use crate::url::Url;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("a mirrored origin requires at least one url")]
pub struct EmptyOriginError;

/// An ordered, non-empty list of equivalent URLs for one logical
/// repository. Index 0 is the authority URL; the rest are mirrors tried in
/// order on fail-over (spec §3.2, §4.3.3).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MirroredOrigin {
    urls: Vec<Url>,
}

impl MirroredOrigin {
    pub fn new(authority: Url, mirrors: impl IntoIterator<Item = Url>) -> Self {
        let mut urls = vec![authority];
        urls.extend(mirrors);
        Self { urls }
    }

    pub fn try_from_vec(urls: Vec<Url>) -> Result<Self, EmptyOriginError> {
        if urls.is_empty() {
            Err(EmptyOriginError)
        } else {
            Ok(Self { urls })
        }
    }

    pub fn authority(&self) -> &Url {
        &self.urls[0]
    }

    pub fn mirrors(&self) -> &[Url] {
        &self.urls[1..]
    }

    /// All URLs, authority first, in fail-over order.
    pub fn iter(&self) -> impl Iterator<Item = &Url> {
        self.urls.iter()
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        false // invariant: always non-empty
    }

    /// Replace the entire origin, e.g. on a 301 mirror-list redirect
    /// (spec §4.3.3).
    pub fn replace(&mut self, urls: Vec<Url>) -> Result<(), EmptyOriginError> {
        if urls.is_empty() {
            return Err(EmptyOriginError);
        }
        self.urls = urls;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authority_is_first() {
        let a = Url::parse("http://a/repo").unwrap();
        let b = Url::parse("http://b/repo").unwrap();
        let origin = MirroredOrigin::new(a.clone(), vec![b.clone()]);
        assert_eq!(origin.authority(), &a);
        assert_eq!(origin.mirrors(), &[b]);
    }

    #[test]
    fn rejects_empty_origin() {
        assert!(MirroredOrigin::try_from_vec(vec![]).is_err());
    }
}
