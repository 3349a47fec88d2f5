use std::fmt;

/// Stable error-kind identifiers, spanning the code ranges in spec §6.3/§7.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    // Invalid input
    BadRequest,
    ProtocolError,
    MalformedRepoFile,
    UnknownRepoType,
    // Auth
    Unauthorized,
    Forbidden,
    PeerCertificateInvalid,
    NoAuthData,
    // Resource
    NotFound,
    MediumNotDesired,
    MountFailed,
    // Transient
    ConnectionFailed,
    Timeout,
    ExpectedSizeExceeded,
    Jammed,
    // User
    Cancelled,
    MediaChangeAbort,
    MediaChangeSkip,
    // Integrity
    InvalidChecksum,
    FilesizeMismatch,
    // Permission
    NoPermission,
    // Configuration
    AlreadyExists,
    // Internal
    InternalError,
    ProtocolInternal,
}

impl ErrorKind {
    /// Worker-protocol response code, per spec §4.2/§6.3, for kinds that
    /// originate on the wire. Kinds with no wire representation (e.g.
    /// [`ErrorKind::AlreadyExists`]) return `None`.
    pub fn code(self) -> Option<u32> {
        use ErrorKind::*;
        Some(match self {
            BadRequest => 400,
            Unauthorized => 401,
            Forbidden => 402,
            PeerCertificateInvalid => 403,
            NotFound => 404,
            ConnectionFailed => 406,
            Timeout => 407,
            Cancelled => 408,
            InvalidChecksum => 409,
            MountFailed => 410,
            Jammed => 411,
            MediaChangeAbort => 412,
            MediaChangeSkip => 413,
            NoAuthData => 414,
            MediumNotDesired => 416,
            InternalError => 500,
            ProtocolInternal => 501,
            _ => return None,
        })
    }

    /// Whether the scheduler is authorized to retry on the next mirror,
    /// per spec §4.3.3 (the `transient` flag, plus the fixed set of codes
    /// that always authorize fail-over: 406, 407, 410, 416).
    pub fn is_transient(self) -> bool {
        use ErrorKind::*;
        matches!(
            self,
            ConnectionFailed | Timeout | ExpectedSizeExceeded | Jammed | MountFailed
                | MediumNotDesired
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Wraps an error with an ordered list of prior-cause strings.
///
/// Spec §7/§9: "every wrapping exception carries an ordered list of prior
/// exception strings; the first cause is preserved and additional causes
/// are appended, not replaced." Mirror-fail-over (§4.3.3) and refresh
/// (§4.5) both rely on this: the *first* exception is kept as the
/// reported cause, and every subsequent attempt's failure is appended to
/// the history in order.
#[derive(Clone, Debug)]
pub struct History<E> {
    first: E,
    rest: Vec<String>,
}

impl<E: fmt::Display> History<E> {
    pub fn new(first: E) -> Self {
        Self {
            first,
            rest: Vec::new(),
        }
    }

    /// Record a later failure. The first cause is never replaced.
    pub fn push(&mut self, later: impl fmt::Display) {
        self.rest.push(later.to_string());
    }

    pub fn cause(&self) -> &E {
        &self.first
    }

    pub fn into_cause(self) -> E {
        self.first
    }

    /// The prior causes, in the order they were recorded.
    pub fn history(&self) -> &[String] {
        &self.rest
    }
}

impl<E: fmt::Display> fmt::Display for History<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.first)?;
        if !self.rest.is_empty() {
            write!(f, " (and {} more: {})", self.rest.len(), self.rest.join("; "))?;
        }
        Ok(())
    }
}

impl<E: std::error::Error + 'static> std::error::Error for History<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.first)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use thiserror::Error;

    #[derive(Debug, Error)]
    #[error("boom: {0}")]
    struct Boom(&'static str);

    #[test]
    fn first_cause_is_preserved() {
        let mut history = History::new(Boom("a timed out"));
        history.push("b connection refused");
        history.push("c not found");

        assert_eq!(history.cause().0, "a timed out");
        assert_eq!(
            history.history(),
            &["b connection refused".to_string(), "c not found".to_string()]
        );
    }

    #[test]
    fn transient_kinds_authorize_failover() {
        assert!(ErrorKind::Timeout.is_transient());
        assert!(ErrorKind::MediumNotDesired.is_transient());
        assert!(!ErrorKind::NotFound.is_transient());
    }
}
