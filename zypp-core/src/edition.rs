use std::cmp::Ordering;
use std::fmt;

/// A package edition: `(epoch, version, release)`. Total order is
/// rpm-vercmp per field (spec §3.1).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Edition {
    epoch: u32,
    version: String,
    release: String,
}

impl Edition {
    pub fn new(epoch: u32, version: impl Into<String>, release: impl Into<String>) -> Self {
        Self {
            epoch,
            version: version.into(),
            release: release.into(),
        }
    }

    pub fn epoch(&self) -> u32 {
        self.epoch
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn release(&self) -> &str {
        &self.release
    }
}

impl fmt::Display for Edition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.epoch != 0 {
            write!(f, "{}:", self.epoch)?;
        }
        write!(f, "{}-{}", self.version, self.release)
    }
}

impl PartialOrd for Edition {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Edition {
    fn cmp(&self, other: &Self) -> Ordering {
        self.epoch
            .cmp(&other.epoch)
            .then_with(|| vercmp(&self.version, &other.version))
            .then_with(|| vercmp(&self.release, &other.release))
    }
}

/// Compare two version/release segments using the rpm-vercmp algorithm:
/// split into alternating runs of digits and non-digits, compare
/// numerically within digit runs and lexically within alpha runs, with
/// `~` sorting before everything (including the empty string) and a
/// trailing extra segment sorting higher than its absence.
fn vercmp(a: &str, b: &str) -> Ordering {
    let mut a = a;
    let mut b = b;

    loop {
        // Skip anything that is not alphanumeric or a tilde.
        a = a.trim_start_matches(|c: char| !c.is_ascii_alphanumeric() && c != '~');
        b = b.trim_start_matches(|c: char| !c.is_ascii_alphanumeric() && c != '~');

        // Tilde sorts before everything, even the empty string.
        if a.starts_with('~') || b.starts_with('~') {
            match (a.starts_with('~'), b.starts_with('~')) {
                (true, true) => {
                    a = &a[1..];
                    b = &b[1..];
                    continue;
                }
                (true, false) => return Ordering::Less,
                (false, true) => return Ordering::Greater,
                (false, false) => unreachable!(),
            }
        }

        if a.is_empty() || b.is_empty() {
            break;
        }

        let (a_seg, a_rest, a_numeric) = take_segment(a);
        let (b_seg, b_rest, b_numeric) = take_segment(b);

        let ord = if a_numeric && b_numeric {
            let a_trimmed = a_seg.trim_start_matches('0');
            let b_trimmed = b_seg.trim_start_matches('0');
            a_trimmed
                .len()
                .cmp(&b_trimmed.len())
                .then_with(|| a_trimmed.cmp(b_trimmed))
        } else if a_numeric {
            // Numeric segments are always newer than alpha segments.
            Ordering::Greater
        } else if b_numeric {
            Ordering::Less
        } else {
            a_seg.cmp(b_seg)
        };

        if ord != Ordering::Equal {
            return ord;
        }

        a = a_rest;
        b = b_rest;
    }

    // Whichever string still has characters left is considered newer.
    match (a.is_empty(), b.is_empty()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => Ordering::Equal,
    }
}

/// Split off a leading run of digits or a leading run of alphabetic
/// characters from `s`, returning `(segment, rest, is_numeric)`.
fn take_segment(s: &str) -> (&str, &str, bool) {
    let is_numeric = s.as_bytes()[0].is_ascii_digit();
    let end = s
        .find(|c: char| c.is_ascii_digit() != is_numeric)
        .unwrap_or(s.len());
    (&s[..end], &s[end..], is_numeric)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ed(v: &str, r: &str) -> Edition {
        Edition::new(0, v, r)
    }

    #[test]
    fn numeric_segments_compare_numerically() {
        assert!(ed("1.9", "1") < ed("1.10", "1"));
    }

    #[test]
    fn epoch_dominates() {
        assert!(Edition::new(0, "99", "1") < Edition::new(1, "1", "1"));
    }

    #[test]
    fn tilde_sorts_before_release() {
        assert!(ed("1.0~rc1", "1") < ed("1.0", "1"));
    }

    #[test]
    fn equal_editions() {
        assert_eq!(ed("1.2.3", "4"), ed("1.2.3", "4"));
    }

    #[test]
    fn longer_numeric_suffix_is_newer() {
        assert!(ed("1.0", "1") < ed("1.0.1", "1"));
    }
}
