//! Request/response messages and the envelope that carries them.
//!
//! Every client message is a [`Request`]; the server answers each one with
//! exactly one [`Response`] carrying the same `seq`. Teacher operations
//! carry the teacher's password, which the server checks through its
//! authenticator before touching any session state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{NetworkId, StudentId, TeacherId, Token};

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// A client → server request.
///
/// String fields default to empty when absent, so a request missing one
/// is reported by the engine as a validation failure rather than as an
/// undecodable frame.
///
/// Internally tagged, so a start request looks like:
///
/// ```json
/// { "type": "Start", "teacher": "alice", "password": "pw", "network": "AA:BB" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Request {
    /// Adds a teacher to the server's directory.
    RegisterTeacher {
        #[serde(default)]
        teacher: TeacherId,
        #[serde(default)]
        password: String,
    },

    /// Opens an attendance window bound to `network`.
    Start {
        #[serde(default)]
        teacher: TeacherId,
        #[serde(default)]
        password: String,
        #[serde(default)]
        network: NetworkId,
    },

    /// Closes the teacher's open window.
    Stop {
        #[serde(default)]
        teacher: TeacherId,
        #[serde(default)]
        password: String,
    },

    /// Fetches the current token, rotating it first if it expired.
    GetToken {
        #[serde(default)]
        teacher: TeacherId,
        #[serde(default)]
        password: String,
    },

    /// A student reporting presence. Needs no password: the token is the
    /// credential.
    Mark {
        #[serde(default)]
        student: StudentId,
        #[serde(default)]
        network: NetworkId,
        #[serde(default)]
        token: Token,
        #[serde(default)]
        teacher: TeacherId,
    },

    /// Lists the students who marked in the teacher's current (or most
    /// recently closed) window.
    ListAttendance {
        #[serde(default)]
        teacher: TeacherId,
        #[serde(default)]
        password: String,
    },

    /// Keep-alive. `client_time` is echoed back for RTT measurement.
    Ping { client_time: u64 },
}

impl Request {
    /// A short, password-free name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::RegisterTeacher { .. } => "RegisterTeacher",
            Self::Start { .. } => "Start",
            Self::Stop { .. } => "Stop",
            Self::GetToken { .. } => "GetToken",
            Self::Mark { .. } => "Mark",
            Self::ListAttendance { .. } => "ListAttendance",
            Self::Ping { .. } => "Ping",
        }
    }
}

// ---------------------------------------------------------------------------
// Response
// ---------------------------------------------------------------------------

/// A server → client response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Response {
    /// The teacher was added to the directory.
    Registered { teacher: TeacherId },

    /// A window is open; `token` is valid for `expires_in` seconds.
    Started {
        teacher: TeacherId,
        token: Token,
        expires_in: u64,
    },

    /// The window is closed. `marked` is how many students made it in,
    /// or `None` if the record store could not be asked.
    Stopped {
        teacher: TeacherId,
        marked: Option<usize>,
    },

    /// The current token and whole seconds until it goes stale.
    Token { token: Token, expires_in: u64 },

    /// The student's mark was recorded.
    Marked { student: StudentId },

    /// Students who marked, in the order they marked, with the window's
    /// wall-clock open and close times.
    Attendance {
        teacher: TeacherId,
        active: bool,
        students: Vec<StudentId>,
        started_at: DateTime<Utc>,
        /// `None` while the window is still open.
        closed_at: Option<DateTime<Utc>>,
    },

    /// Reply to [`Request::Ping`]. `server_time` is milliseconds since
    /// the connection was accepted.
    Pong { client_time: u64, server_time: u64 },

    /// The request failed.
    ///
    /// `code` follows HTTP conventions (400, 401, 409, 503). `kind`
    /// names the exact failure (`"TokenExpired"`, `"DuplicateMark"`, ...)
    /// so clients can branch without parsing `message`.
    Error {
        code: u16,
        kind: String,
        message: String,
    },
}

// ---------------------------------------------------------------------------
// Payload / Envelope
// ---------------------------------------------------------------------------

/// What's inside an envelope: a request from a client or a response from
/// the server.
///
/// Adjacently tagged: `{ "type": "Request", "data": { "type": "Ping", ... } }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Payload {
    Request(Request),
    Response(Response),
}

/// The top-level wire format. Every frame is one envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Client-chosen sequence number; the server echoes it on the response
    /// so clients can match replies to requests.
    pub seq: u64,

    /// Milliseconds since the connection was accepted (server → client).
    /// Clients may omit it.
    #[serde(default)]
    pub timestamp: u64,

    pub payload: Payload,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_request_json_format() {
        let json = r#"{
            "type": "Start",
            "teacher": "alice",
            "password": "pw",
            "network": "AA:BB"
        }"#;
        let req: Request = serde_json::from_str(json).unwrap();
        assert_eq!(
            req,
            Request::Start {
                teacher: TeacherId::from("alice"),
                password: "pw".into(),
                network: NetworkId::from("AA:BB"),
            }
        );
    }

    #[test]
    fn test_mark_request_json_format() {
        let req = Request::Mark {
            student: StudentId::from("S1"),
            network: NetworkId::from("AA:BB"),
            token: Token::from("X7K2Q9RT"),
            teacher: TeacherId::from("alice"),
        };
        let json: serde_json::Value = serde_json::to_value(&req).unwrap();

        assert_eq!(json["type"], "Mark");
        assert_eq!(json["student"], "S1");
        assert_eq!(json["token"], "X7K2Q9RT");
        assert!(json.get("password").is_none(), "students send no password");
    }

    #[test]
    fn test_mark_request_missing_token_decodes_blank() {
        let json = r#"{"type": "Mark", "student": "S1", "network": "AA:BB", "teacher": "alice"}"#;
        let req: Request = serde_json::from_str(json).unwrap();
        match req {
            Request::Mark { token, student, .. } => {
                assert!(token.is_blank());
                assert_eq!(student, StudentId::from("S1"));
            }
            other => panic!("expected Mark, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_request_type_is_rejected() {
        let json = r#"{"type": "Teleport", "teacher": "alice"}"#;
        let result: Result<Request, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }

    #[test]
    fn test_error_response_json_format() {
        let resp = Response::Error {
            code: 409,
            kind: "DuplicateMark".into(),
            message: "attendance already marked for S1".into(),
        };
        let json: serde_json::Value = serde_json::to_value(&resp).unwrap();

        assert_eq!(json["type"], "Error");
        assert_eq!(json["code"], 409);
        assert_eq!(json["kind"], "DuplicateMark");
    }

    #[test]
    fn test_attendance_response_lists_students_in_order() {
        let resp = Response::Attendance {
            teacher: TeacherId::from("alice"),
            active: true,
            students: vec![StudentId::from("S2"), StudentId::from("S1")],
            started_at: Utc::now(),
            closed_at: None,
        };
        let json: serde_json::Value = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["students"], serde_json::json!(["S2", "S1"]));
        assert!(json["started_at"].is_string());
        assert!(json["closed_at"].is_null());
    }

    #[test]
    fn test_payload_is_adjacently_tagged() {
        let payload = Payload::Request(Request::Ping { client_time: 5 });
        let json: serde_json::Value = serde_json::to_value(&payload).unwrap();

        assert_eq!(json["type"], "Request");
        assert_eq!(json["data"]["type"], "Ping");
        assert_eq!(json["data"]["client_time"], 5);
    }

    #[test]
    fn test_envelope_timestamp_defaults_when_missing() {
        let json = r#"{
            "seq": 1,
            "payload": { "type": "Request", "data": { "type": "Ping", "client_time": 0 } }
        }"#;
        let envelope: Envelope = serde_json::from_str(json).unwrap();
        assert_eq!(envelope.timestamp, 0);
    }

    #[test]
    fn test_unknown_request_type_without_fields_is_rejected() {
        let json = r#"{"type": "TeleportToClass"}"#;
        let result: Result<Request, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }

    #[test]
    fn test_request_name_never_includes_password() {
        let req = Request::Stop {
            teacher: TeacherId::from("alice"),
            password: "hunter2".into(),
        };
        assert_eq!(req.name(), "Stop");
    }
}
