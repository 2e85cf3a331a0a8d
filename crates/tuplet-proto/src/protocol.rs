//! Line-oriented request/response protocol spoken between the UI and the
//! playback daemon.
//!
//! One connection carries exactly one request line and one response line.
//! Fields are separated by a tab; every line ends with `\n`.
//!
//! ```text
//!   PLAY\t<path>\t<start-secs>     -> OK | ERROR <message>
//!   STOP                           -> OK
//!   PAUSE                          -> OK | ERROR <message>
//!   SEEK\t<secs>                   -> OK | ERROR <message>
//!   GET_INFO                       -> NONE | INFO\t<name>\t<pos>\t<duration>
//!   QUIT                           -> OK  (daemon exits afterwards)
//! ```

use thiserror::Error;

/// Upper bound on a single request line, newline included.
pub const MAX_REQUEST_BYTES: usize = 8 * 1024;

const FIELD_SEP: char = '\t';

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProtocolError {
    #[error("unknown command")]
    UnknownCommand,
    #[error("missing {0}")]
    MissingArgument(&'static str),
    #[error("invalid number: {0}")]
    InvalidNumber(String),
    #[error("field contains a tab or newline: {0:?}")]
    UnencodableField(String),
    #[error("malformed response: {0:?}")]
    MalformedResponse(String),
}

/// Messages sent from a client to the daemon.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Play { path: String, start_secs: f64 },
    Stop,
    Pause,
    Seek { secs: f64 },
    GetInfo,
    Quit,
}

/// The daemon's single reply to a request.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Ok,
    Error(String),
    /// Nothing is playing.
    None,
    Info {
        name: String,
        position_secs: Option<f64>,
        duration_secs: Option<f64>,
    },
}

impl Request {
    pub fn verb(&self) -> &'static str {
        match self {
            Request::Play { .. } => "PLAY",
            Request::Stop => "STOP",
            Request::Pause => "PAUSE",
            Request::Seek { .. } => "SEEK",
            Request::GetInfo => "GET_INFO",
            Request::Quit => "QUIT",
        }
    }

    /// Serialise to a newline-terminated line.
    pub fn encode(&self) -> Result<String, ProtocolError> {
        let line = match self {
            Request::Play { path, start_secs } => {
                check_field(path)?;
                format!("PLAY{FIELD_SEP}{path}{FIELD_SEP}{start_secs}")
            }
            Request::Seek { secs } => format!("SEEK{FIELD_SEP}{secs}"),
            other => other.verb().to_string(),
        };
        Ok(line + "\n")
    }

    /// Parse the first line of `raw`.  Verbs are case-insensitive and
    /// arguments are trimmed.
    pub fn decode(raw: &str) -> Result<Self, ProtocolError> {
        let line = raw.split('\n').next().unwrap_or("").trim();
        let mut parts = line.splitn(3, FIELD_SEP);
        let verb = parts.next().unwrap_or("").trim().to_ascii_uppercase();
        let arg1 = parts.next().map(str::trim).unwrap_or("");
        let arg2 = parts.next().map(str::trim).unwrap_or("");

        match verb.as_str() {
            "PLAY" => {
                if arg1.is_empty() {
                    return Err(ProtocolError::MissingArgument("path"));
                }
                let start_secs = if arg2.is_empty() { 0.0 } else { parse_secs(arg2)? };
                Ok(Request::Play {
                    path: arg1.to_string(),
                    start_secs,
                })
            }
            "STOP" => Ok(Request::Stop),
            "PAUSE" => Ok(Request::Pause),
            "SEEK" => {
                // Older clients put the position in the third field.
                let raw_secs = if arg2.is_empty() { arg1 } else { arg2 };
                if raw_secs.is_empty() {
                    return Err(ProtocolError::MissingArgument("seconds"));
                }
                Ok(Request::Seek {
                    secs: parse_secs(raw_secs)?,
                })
            }
            "GET_INFO" => Ok(Request::GetInfo),
            "QUIT" => Ok(Request::Quit),
            _ => Err(ProtocolError::UnknownCommand),
        }
    }
}

impl Response {
    pub fn error(message: impl std::fmt::Display) -> Self {
        Response::Error(message.to_string())
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Response::Ok)
    }

    /// Serialise to a newline-terminated line.  Tabs and newlines inside
    /// free-text fields are flattened to spaces so the reply stays one line.
    pub fn encode(&self) -> String {
        let line = match self {
            Response::Ok => "OK".to_string(),
            Response::None => "NONE".to_string(),
            Response::Error(message) => format!("ERROR {}", flatten(message)),
            Response::Info {
                name,
                position_secs,
                duration_secs,
            } => format!(
                "INFO{FIELD_SEP}{}{FIELD_SEP}{}{FIELD_SEP}{}",
                flatten(name),
                fmt_secs(*position_secs),
                fmt_secs(*duration_secs)
            ),
        };
        line + "\n"
    }

    pub fn decode(raw: &str) -> Result<Self, ProtocolError> {
        let line = raw.split('\n').next().unwrap_or("").trim_end_matches('\r');
        match line.trim() {
            "OK" => return Ok(Response::Ok),
            "NONE" => return Ok(Response::None),
            "ERROR" => return Ok(Response::Error(String::new())),
            _ => {}
        }
        if let Some(message) = line.strip_prefix("ERROR ") {
            return Ok(Response::Error(message.trim().to_string()));
        }
        if let Some(rest) = line.strip_prefix("INFO\t") {
            let mut fields = rest.splitn(3, FIELD_SEP);
            let name = fields.next().unwrap_or("").to_string();
            let position_secs = fields.next().and_then(parse_opt_secs);
            let duration_secs = fields.next().and_then(parse_opt_secs);
            return Ok(Response::Info {
                name,
                position_secs,
                duration_secs,
            });
        }
        Err(ProtocolError::MalformedResponse(line.to_string()))
    }
}

fn check_field(value: &str) -> Result<(), ProtocolError> {
    if value.contains(['\t', '\n', '\r']) {
        return Err(ProtocolError::UnencodableField(value.to_string()));
    }
    Ok(())
}

fn parse_secs(raw: &str) -> Result<f64, ProtocolError> {
    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| ProtocolError::InvalidNumber(raw.to_string()))
}

fn parse_opt_secs(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    raw.parse::<f64>().ok()
}

fn fmt_secs(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn flatten(text: &str) -> String {
    text.replace(['\t', '\n', '\r'], " ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_play_with_offset() {
        let req = Request::decode("PLAY\t/music/b.mp3\t12.5\n").unwrap();
        assert_eq!(
            req,
            Request::Play {
                path: "/music/b.mp3".into(),
                start_secs: 12.5
            }
        );
    }

    #[test]
    fn test_decode_play_without_offset_defaults_to_zero() {
        let req = Request::decode("play\tb.mp3").unwrap();
        assert_eq!(
            req,
            Request::Play {
                path: "b.mp3".into(),
                start_secs: 0.0
            }
        );
    }

    #[test]
    fn test_decode_play_errors() {
        assert_eq!(
            Request::decode("PLAY\n"),
            Err(ProtocolError::MissingArgument("path"))
        );
        assert!(matches!(
            Request::decode("PLAY\ta.mp3\tsoon"),
            Err(ProtocolError::InvalidNumber(_))
        ));
    }

    #[test]
    fn test_decode_seek_accepts_either_field() {
        assert_eq!(
            Request::decode("SEEK\t42").unwrap(),
            Request::Seek { secs: 42.0 }
        );
        assert_eq!(
            Request::decode("SEEK\t\t7.5").unwrap(),
            Request::Seek { secs: 7.5 }
        );
        assert_eq!(
            Request::decode("SEEK"),
            Err(ProtocolError::MissingArgument("seconds"))
        );
    }

    #[test]
    fn test_unknown_verb() {
        let err = Request::decode("DANCE\n").unwrap_err();
        assert_eq!(Response::error(err).encode(), "ERROR unknown command\n");
    }

    #[test]
    fn test_encode_rejects_tab_in_path() {
        let req = Request::Play {
            path: "bad\tname.mp3".into(),
            start_secs: 0.0,
        };
        assert!(matches!(
            req.encode(),
            Err(ProtocolError::UnencodableField(_))
        ));
    }

    #[test]
    fn test_info_formatting() {
        let resp = Response::Info {
            name: "b.mp3".into(),
            position_secs: Some(0.0),
            duration_secs: Some(181.25),
        };
        assert_eq!(resp.encode(), "INFO\tb.mp3\t0\t181.25\n");

        let unknown = Response::Info {
            name: "b.mp3".into(),
            position_secs: None,
            duration_secs: None,
        };
        assert_eq!(unknown.encode(), "INFO\tb.mp3\t\t\n");
        assert_eq!(Response::decode(&unknown.encode()).unwrap(), unknown);
    }

    #[test]
    fn test_decode_responses() {
        assert_eq!(Response::decode("OK\n").unwrap(), Response::Ok);
        assert_eq!(Response::decode("NONE\n").unwrap(), Response::None);
        assert_eq!(
            Response::decode("ERROR no such file\n").unwrap(),
            Response::Error("no such file".into())
        );
        assert!(Response::decode("WAT").is_err());
    }

    #[test]
    fn test_error_message_is_flattened() {
        let resp = Response::error("line one\nline two");
        assert_eq!(resp.encode(), "ERROR line one line two\n");
    }
}
