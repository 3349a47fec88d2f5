//! Worker protocol: request/response message taxonomy layered over frames
//! (spec §4.2, §6.3).

use thiserror::Error;

use crate::frame::Frame;

/// A numeric worker-protocol code, stable across releases (spec §4.2 table).
pub type Code = u32;

pub mod code {
    use super::Code;

    pub const PROVIDE_STARTED: Code = 100;
    pub const PROVIDE_FINISHED: Code = 200;
    pub const ATTACH_FINISHED: Code = 201;
    pub const AUTH_INFO: Code = 202;
    pub const MEDIA_CHANGED: Code = 203;
    pub const DETACH_FINISHED: Code = 204;
    pub const REDIRECT: Code = 300;
    pub const METALINK_REDIRECT: Code = 301;
    pub const BAD_REQUEST: Code = 400;
    pub const UNAUTHORIZED: Code = 401;
    pub const FORBIDDEN: Code = 402;
    pub const PEER_CERT_INVALID: Code = 403;
    pub const NOT_FOUND: Code = 404;
    pub const EXPECTED_SIZE_EXCEEDED: Code = 405;
    pub const CONNECTION_FAILED: Code = 406;
    pub const TIMEOUT: Code = 407;
    pub const CANCELLED: Code = 408;
    pub const INVALID_CHECKSUM: Code = 409;
    pub const MOUNT_FAILED: Code = 410;
    pub const JAMMED: Code = 411;
    pub const MEDIA_CHANGE_ABORT: Code = 412;
    pub const MEDIA_CHANGE_SKIP: Code = 413;
    pub const NO_AUTH_DATA: Code = 414;
    pub const MEDIUM_NOT_DESIRED: Code = 416;
    pub const INTERNAL_ERROR: Code = 500;
    pub const PROTOCOL_ERROR: Code = 501;
    pub const PROVIDE: Code = 600;
    pub const CANCEL: Code = 601;
    pub const ATTACH: Code = 602;
    pub const DETACH: Code = 603;
    pub const AUTH_REQUIRED: Code = 700;
    pub const MEDIA_CHANGE_REQUIRED: Code = 701;
}

/// Worker type, advertised in `WorkerCaps` (spec §4.2).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WorkerType {
    Downloading,
    SimpleMount,
    VolatileMount,
    CpuBound,
}

bitflags::bitflags! {
    /// Capability flags advertised in `WorkerCaps` (spec §4.2).
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct Capabilities: u32 {
        const SINGLE_INSTANCE = 1 << 0;
        const PIPELINE        = 1 << 1;
        const ZYPP_LOG_FORMAT = 1 << 2;
        const FILE_ARTIFACTS  = 1 << 3;
    }
}

/// Sent once by the scheduler right after spawning a worker (spec §4.2.1).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProviderConfiguration {
    pub config: Vec<(String, String)>,
}

/// Sent once by the worker in response to [`ProviderConfiguration`]
/// (spec §4.2.2).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkerCaps {
    pub protocol_version: u32,
    pub worker_type: WorkerType,
    pub capabilities: Capabilities,
    pub worker_name: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MessageError {
    #[error("frame command must be 'ProvideMessage', got {0:?}")]
    WrongCommand(String),
    #[error("missing required header {0:?}")]
    MissingHeader(&'static str),
    #[error("invalid value for header {0:?}")]
    InvalidHeader(&'static str),
    #[error("unknown requestCode {0}")]
    UnknownCode(Code),
    #[error("worker caps must set exactly a known worker type")]
    UnknownWorkerType,
    #[error("attach verify triplet must be all-present or all-absent")]
    PartialVerifyTriplet,
}

/// An error report carried by 4xx/5xx codes (spec §4.2, §6.3).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ErrorReport {
    pub code: Code,
    pub reason: String,
    pub history: Option<String>,
    pub transient: bool,
}

/// The body of a controller→worker `Attach` (602) request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttachRequest {
    pub url: String,
    pub attach_id: String,
    pub label: String,
    pub verify: Option<VerifyInfo>,
    pub devices: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerifyInfo {
    pub verify_type: String,
    pub verify_data: String,
    pub media_nr: i32,
}

/// The body of a controller→worker `Provide` (600) request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProvideRequestMsg {
    pub url: String,
    pub filename: Option<String>,
    pub delta_file: Option<String>,
    pub expected_filesize: Option<i64>,
    pub check_existence_only: bool,
    pub metalink_enabled: bool,
}

/// The full set of worker-protocol messages (spec §4.2/§6.3), keyed on
/// `requestCode`. Every variant is correlated to a request via
/// `requestId`, carried alongside by the transport layer rather than on
/// this type, separating "what happened" from "which request".
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WorkerMessage {
    ProvideStarted {
        url: String,
        local_filename: Option<String>,
        staging_filename: Option<String>,
    },
    ProvideFinished {
        local_filename: String,
        cache_hit: bool,
    },
    AttachFinished {
        local_mountpoint: Option<String>,
    },
    AuthInfo {
        username: String,
        password: String,
        auth_timestamp: i64,
        auth_type: Option<String>,
    },
    MediaChanged,
    DetachFinished,
    Redirect {
        new_url: String,
    },
    MetalinkRedirect {
        new_urls: Vec<String>,
    },
    Error(ErrorReport),
    Provide(ProvideRequestMsg),
    Cancel,
    Attach(AttachRequest),
    Detach {
        url: String,
    },
    AuthRequired {
        effective_url: String,
        last_auth_timestamp: Option<i64>,
        username: Option<String>,
        auth_hint: Option<String>,
    },
    MediaChangeRequired {
        label: String,
        media_nr: i32,
        devices: Vec<String>,
        desc: Option<String>,
    },
}

impl WorkerMessage {
    pub fn code(&self) -> Code {
        use code::*;
        match self {
            Self::ProvideStarted { .. } => PROVIDE_STARTED,
            Self::ProvideFinished { .. } => PROVIDE_FINISHED,
            Self::AttachFinished { .. } => ATTACH_FINISHED,
            Self::AuthInfo { .. } => AUTH_INFO,
            Self::MediaChanged => MEDIA_CHANGED,
            Self::DetachFinished => DETACH_FINISHED,
            Self::Redirect { .. } => REDIRECT,
            Self::MetalinkRedirect { .. } => METALINK_REDIRECT,
            Self::Error(report) => report.code,
            Self::Provide(_) => PROVIDE,
            Self::Cancel => CANCEL,
            Self::Attach(_) => ATTACH,
            Self::Detach { .. } => DETACH,
            Self::AuthRequired { .. } => AUTH_REQUIRED,
            Self::MediaChangeRequired { .. } => MEDIA_CHANGE_REQUIRED,
        }
    }

    /// Whether this message originates from the worker side (spec §4.2:
    /// W→C vs C→W in the code table).
    pub fn is_from_worker(&self) -> bool {
        let c = self.code();
        (100..=599).contains(&c) || (700..=799).contains(&c)
    }

    pub fn to_frame(&self, request_id: u32) -> Frame {
        let mut frame = Frame::new("ProvideMessage")
            .with_header("requestCode", self.code().to_string())
            .with_header("requestId", request_id.to_string());

        match self {
            Self::ProvideStarted {
                url,
                local_filename,
                staging_filename,
            } => {
                frame = frame.with_header("url", url.clone());
                if let Some(f) = local_filename {
                    frame = frame.with_header("local_filename", f.clone());
                }
                if let Some(f) = staging_filename {
                    frame = frame.with_header("staging_filename", f.clone());
                }
            }
            Self::ProvideFinished {
                local_filename,
                cache_hit,
            } => {
                frame = frame
                    .with_header("local_filename", local_filename.clone())
                    .with_header("cacheHit", bool_str(*cache_hit));
            }
            Self::AttachFinished { local_mountpoint } => {
                if let Some(m) = local_mountpoint {
                    frame = frame.with_header("local_mountpoint", m.clone());
                }
            }
            Self::AuthInfo {
                username,
                password,
                auth_timestamp,
                auth_type,
            } => {
                frame = frame
                    .with_header("username", username.clone())
                    .with_header("password", password.clone())
                    .with_header("auth_timestamp", auth_timestamp.to_string());
                if let Some(t) = auth_type {
                    frame = frame.with_header("authType", t.clone());
                }
            }
            Self::MediaChanged | Self::DetachFinished | Self::Cancel => {}
            Self::Redirect { new_url } => {
                frame = frame.with_header("new_url", new_url.clone());
            }
            Self::MetalinkRedirect { new_urls } => {
                for url in new_urls {
                    frame = frame.with_header("new_url", url.clone());
                }
            }
            Self::Error(report) => {
                frame = frame
                    .with_header("reason", report.reason.clone())
                    .with_header("transient", bool_str(report.transient));
                if let Some(h) = &report.history {
                    frame = frame.with_header("history", h.clone());
                }
            }
            Self::Provide(req) => {
                frame = frame
                    .with_header("url", req.url.clone())
                    .with_header("check_existance_only", bool_str(req.check_existence_only))
                    .with_header("metalink_enabled", bool_str(req.metalink_enabled));
                if let Some(f) = &req.filename {
                    frame = frame.with_header("filename", f.clone());
                }
                if let Some(f) = &req.delta_file {
                    frame = frame.with_header("delta_file", f.clone());
                }
                if let Some(sz) = req.expected_filesize {
                    frame = frame.with_header("expected_filesize", sz.to_string());
                }
            }
            Self::Attach(req) => {
                frame = frame
                    .with_header("url", req.url.clone())
                    .with_header("attach_id", req.attach_id.clone())
                    .with_header("label", req.label.clone());
                if let Some(v) = &req.verify {
                    frame = frame
                        .with_header("verify_type", v.verify_type.clone())
                        .with_header("verify_data", v.verify_data.clone())
                        .with_header("media_nr", v.media_nr.to_string());
                }
                for device in &req.devices {
                    frame = frame.with_header("device", device.clone());
                }
            }
            Self::Detach { url } => {
                frame = frame.with_header("url", url.clone());
            }
            Self::AuthRequired {
                effective_url,
                last_auth_timestamp,
                username,
                auth_hint,
            } => {
                frame = frame.with_header("effective_url", effective_url.clone());
                if let Some(ts) = last_auth_timestamp {
                    frame = frame.with_header("last_auth_timestamp", ts.to_string());
                }
                if let Some(u) = username {
                    frame = frame.with_header("username", u.clone());
                }
                if let Some(h) = auth_hint {
                    frame = frame.with_header("authHint", h.clone());
                }
            }
            Self::MediaChangeRequired {
                label,
                media_nr,
                devices,
                desc,
            } => {
                frame = frame
                    .with_header("label", label.clone())
                    .with_header("media_nr", media_nr.to_string());
                for device in devices {
                    frame = frame.with_header("device", device.clone());
                }
                if let Some(d) = desc {
                    frame = frame.with_header("desc", d.clone());
                }
            }
        }
        frame
    }

    pub fn from_frame(frame: &Frame) -> Result<(u32, Self), MessageError> {
        if frame.command != "ProvideMessage" {
            return Err(MessageError::WrongCommand(frame.command.clone()));
        }
        let request_code = frame
            .header_u32("requestCode")
            .ok_or(MessageError::MissingHeader("requestCode"))?;
        let request_id = frame
            .header_u32("requestId")
            .ok_or(MessageError::MissingHeader("requestId"))?;

        let headers_repeated = |key: &str| -> Vec<String> {
            frame
                .headers
                .iter()
                .filter(|(k, _)| k.eq_ignore_ascii_case(key))
                .map(|(_, v)| v.clone())
                .collect()
        };
        let req = |key: &'static str| -> Result<String, MessageError> {
            frame
                .header(key)
                .map(str::to_string)
                .ok_or(MessageError::MissingHeader(key))
        };
        let opt = |key: &str| -> Option<String> { frame.header(key).map(str::to_string) };

        use code::*;
        let message = match request_code {
            PROVIDE_STARTED => Self::ProvideStarted {
                url: req("url")?,
                local_filename: opt("local_filename"),
                staging_filename: opt("staging_filename"),
            },
            PROVIDE_FINISHED => Self::ProvideFinished {
                local_filename: req("local_filename")?,
                cache_hit: frame
                    .header_bool("cacheHit")
                    .ok_or(MessageError::MissingHeader("cacheHit"))?,
            },
            ATTACH_FINISHED => Self::AttachFinished {
                local_mountpoint: opt("local_mountpoint"),
            },
            AUTH_INFO => Self::AuthInfo {
                username: req("username")?,
                password: req("password")?,
                auth_timestamp: req("auth_timestamp")?
                    .parse()
                    .map_err(|_| MessageError::InvalidHeader("auth_timestamp"))?,
                auth_type: opt("authType"),
            },
            MEDIA_CHANGED => Self::MediaChanged,
            DETACH_FINISHED => Self::DetachFinished,
            REDIRECT => Self::Redirect {
                new_url: req("new_url")?,
            },
            METALINK_REDIRECT => {
                let urls = headers_repeated("new_url");
                if urls.is_empty() {
                    return Err(MessageError::MissingHeader("new_url"));
                }
                Self::MetalinkRedirect { new_urls: urls }
            }
            PROVIDE => Self::Provide(ProvideRequestMsg {
                url: req("url")?,
                filename: opt("filename"),
                delta_file: opt("delta_file"),
                expected_filesize: frame.header_u32("expected_filesize").map(i64::from).or_else(
                    || frame.header("expected_filesize").and_then(|v| v.parse().ok()),
                ),
                check_existence_only: frame.header_bool("check_existance_only").unwrap_or(false),
                metalink_enabled: frame.header_bool("metalink_enabled").unwrap_or(false),
            }),
            CANCEL => Self::Cancel,
            ATTACH => {
                let verify_type = opt("verify_type");
                let verify_data = opt("verify_data");
                let media_nr = opt("media_nr");
                let verify = match (verify_type, verify_data, media_nr) {
                    (None, None, None) => None,
                    (Some(verify_type), Some(verify_data), Some(media_nr)) => Some(VerifyInfo {
                        verify_type,
                        verify_data,
                        media_nr: media_nr
                            .parse()
                            .map_err(|_| MessageError::InvalidHeader("media_nr"))?,
                    }),
                    _ => return Err(MessageError::PartialVerifyTriplet),
                };
                Self::Attach(AttachRequest {
                    url: req("url")?,
                    attach_id: req("attach_id")?,
                    label: req("label")?,
                    verify,
                    devices: headers_repeated("device"),
                })
            }
            DETACH => Self::Detach { url: req("url")? },
            AUTH_REQUIRED => Self::AuthRequired {
                effective_url: req("effective_url")?,
                last_auth_timestamp: frame.header("last_auth_timestamp").and_then(|v| v.parse().ok()),
                username: opt("username"),
                auth_hint: opt("authHint"),
            },
            MEDIA_CHANGE_REQUIRED => Self::MediaChangeRequired {
                label: req("label")?,
                media_nr: req("media_nr")?
                    .parse()
                    .map_err(|_| MessageError::InvalidHeader("media_nr"))?,
                devices: headers_repeated("device"),
                desc: opt("desc"),
            },
            other if (400..=599).contains(&other) => Self::Error(ErrorReport {
                code: other,
                reason: req("reason")?,
                history: opt("history"),
                transient: frame.header_bool("transient").unwrap_or(false),
            }),
            other => return Err(MessageError::UnknownCode(other)),
        };

        Ok((request_id, message))
    }
}

fn bool_str(b: bool) -> &'static str {
    if b {
        "1"
    } else {
        "0"
    }
}

impl ProviderConfiguration {
    pub fn to_frame(&self) -> Frame {
        let mut frame = Frame::new("ProviderConfiguration");
        for (k, v) in &self.config {
            frame = frame.with_header(k.clone(), v.clone());
        }
        frame
    }

    pub fn from_frame(frame: &Frame) -> Result<Self, MessageError> {
        if frame.command != "ProviderConfiguration" {
            return Err(MessageError::WrongCommand(frame.command.clone()));
        }
        Ok(Self {
            config: frame.headers.clone(),
        })
    }
}

impl WorkerCaps {
    pub fn to_frame(&self) -> Frame {
        Frame::new("WorkerCaps")
            .with_header("protocol_version", self.protocol_version.to_string())
            .with_header("worker_type", worker_type_str(self.worker_type))
            .with_header("capabilities", self.capabilities.bits().to_string())
            .with_header("worker_name", self.worker_name.clone())
    }

    pub fn from_frame(frame: &Frame) -> Result<Self, MessageError> {
        if frame.command != "WorkerCaps" {
            return Err(MessageError::WrongCommand(frame.command.clone()));
        }
        let protocol_version = frame
            .header_u32("protocol_version")
            .ok_or(MessageError::MissingHeader("protocol_version"))?;
        let worker_type = parse_worker_type(
            frame
                .header("worker_type")
                .ok_or(MessageError::MissingHeader("worker_type"))?,
        )?;
        let capabilities = Capabilities::from_bits_truncate(
            frame
                .header("capabilities")
                .and_then(|v| v.parse().ok())
                .ok_or(MessageError::MissingHeader("capabilities"))?,
        );
        let worker_name = frame
            .header("worker_name")
            .ok_or(MessageError::MissingHeader("worker_name"))?
            .to_string();

        Ok(Self {
            protocol_version,
            worker_type,
            capabilities,
            worker_name,
        })
    }
}

fn worker_type_str(t: WorkerType) -> &'static str {
    match t {
        WorkerType::Downloading => "Downloading",
        WorkerType::SimpleMount => "SimpleMount",
        WorkerType::VolatileMount => "VolatileMount",
        WorkerType::CpuBound => "CPUBound",
    }
}

fn parse_worker_type(s: &str) -> Result<WorkerType, MessageError> {
    match s {
        "Downloading" => Ok(WorkerType::Downloading),
        "SimpleMount" => Ok(WorkerType::SimpleMount),
        "VolatileMount" => Ok(WorkerType::VolatileMount),
        "CPUBound" => Ok(WorkerType::CpuBound),
        _ => Err(MessageError::UnknownWorkerType),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provide_message_round_trips() {
        let msg = WorkerMessage::Provide(ProvideRequestMsg {
            url: "https://example.org/repomd.xml".into(),
            filename: Some("repomd.xml".into()),
            delta_file: None,
            expected_filesize: Some(1234),
            check_existence_only: false,
            metalink_enabled: true,
        });
        let frame = msg.to_frame(42);
        let (id, decoded) = WorkerMessage::from_frame(&frame).unwrap();
        assert_eq!(id, 42);
        assert_eq!(decoded, msg);
    }

    #[test]
    fn metalink_redirect_preserves_order() {
        let msg = WorkerMessage::MetalinkRedirect {
            new_urls: vec!["https://a".into(), "https://b".into(), "https://c".into()],
        };
        let frame = msg.to_frame(1);
        let (_, decoded) = WorkerMessage::from_frame(&frame).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn attach_with_partial_verify_triplet_is_rejected() {
        let mut frame = Frame::new("ProvideMessage")
            .with_header("requestCode", code::ATTACH.to_string())
            .with_header("requestId", "1")
            .with_header("url", "dvd:///")
            .with_header("attach_id", "id-1")
            .with_header("label", "disc 1")
            .with_header("verify_type", "checksum");
        frame = frame.with_header("verify_data", "deadbeef");
        // media_nr intentionally omitted: partial triplet.
        let err = WorkerMessage::from_frame(&frame).unwrap_err();
        assert_eq!(err, MessageError::PartialVerifyTriplet);
    }

    #[test]
    fn error_report_carries_history_and_transient() {
        let msg = WorkerMessage::Error(ErrorReport {
            code: code::CONNECTION_FAILED,
            reason: "connection refused".into(),
            history: Some("attempt 1 failed".into()),
            transient: true,
        });
        let frame = msg.to_frame(9);
        let (_, decoded) = WorkerMessage::from_frame(&frame).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn worker_caps_round_trip() {
        let caps = WorkerCaps {
            protocol_version: 1,
            worker_type: WorkerType::Downloading,
            capabilities: Capabilities::PIPELINE | Capabilities::ZYPP_LOG_FORMAT,
            worker_name: "curl".into(),
        };
        let frame = caps.to_frame();
        let decoded = WorkerCaps::from_frame(&frame).unwrap();
        assert_eq!(decoded, caps);
    }
}
