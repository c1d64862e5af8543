//! Per-connection handler: decode requests, check credentials, call the
//! engine, answer.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Receive an envelope → decode it
//!   2. Teacher operations: authenticate teacher + password
//!   3. Dispatch to the session engine
//!   4. Reply with exactly one response envelope carrying the request's `seq`
//!
//! Failures never close the connection; they come back as
//! `Response::Error` so a classroom screen can keep polling.

use std::sync::Arc;
use std::time::Instant;

use rollcall_protocol::{Codec, Envelope, Payload, Request, Response, TeacherId};
use rollcall_session::{Authenticator, SessionError};
use rollcall_store::RecordStore;
use rollcall_transport::{Connection, WebSocketConnection};

use crate::RollcallError;
use crate::server::ServerState;

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<A, S, C>(
    conn: WebSocketConnection,
    state: Arc<ServerState<A, S, C>>,
) -> Result<(), RollcallError>
where
    A: Authenticator,
    S: RecordStore,
    C: Codec,
{
    let conn_id = conn.id();
    let peer = conn.peer_addr();
    tracing::debug!(%conn_id, ?peer, "handling new connection");

    let start = Instant::now();

    loop {
        let data = match tokio::time::timeout(state.idle_timeout, conn.recv()).await {
            Ok(Ok(Some(data))) => data,
            Ok(Ok(None)) => {
                tracing::debug!(%conn_id, "connection closed cleanly");
                break;
            }
            Ok(Err(e)) => {
                tracing::debug!(%conn_id, error = %e, "recv error");
                break;
            }
            Err(_) => {
                tracing::info!(%conn_id, "connection idle too long, closing");
                let _ = conn.close().await;
                break;
            }
        };

        let envelope: Envelope = match state.codec.decode(&data) {
            Ok(env) => env,
            Err(e) => {
                tracing::debug!(%conn_id, error = %e, "failed to decode envelope");
                let reply = error_reply(400, "DecodeError", &e.to_string());
                send(&conn, &state.codec, 0, reply, &start).await?;
                continue;
            }
        };

        let reply = match envelope.payload {
            Payload::Request(request) => {
                tracing::debug!(%conn_id, seq = envelope.seq, request = request.name(), "request");
                match dispatch(&state, request, &start).await {
                    Ok(response) => response,
                    Err(e) => {
                        if e.is_retryable() {
                            tracing::warn!(%conn_id, error = %e, "request failed, retryable");
                        } else {
                            tracing::debug!(%conn_id, error = %e, "request rejected");
                        }
                        session_error_reply(&e)
                    }
                }
            }
            Payload::Response(_) => error_reply(
                400,
                "InvalidMessage",
                "clients send requests, not responses",
            ),
        };

        send(&conn, &state.codec, envelope.seq, reply, &start).await?;
    }

    Ok(())
}

/// Runs one request against the authenticator and engine.
async fn dispatch<A, S, C>(
    state: &ServerState<A, S, C>,
    request: Request,
    start: &Instant,
) -> Result<Response, SessionError>
where
    A: Authenticator,
    S: RecordStore,
    C: Codec,
{
    let engine = &state.engine;

    let response = match request {
        Request::RegisterTeacher { teacher, password } => {
            state.auth.register(&teacher, &password).await?;
            Response::Registered { teacher }
        }

        Request::Start {
            teacher,
            password,
            network,
        } => {
            authenticate(state, &teacher, &password).await?;
            let started = engine.start(&teacher, &network).await?;
            Response::Started {
                teacher,
                token: started.token,
                expires_in: started.expires_in,
            }
        }

        Request::Stop { teacher, password } => {
            authenticate(state, &teacher, &password).await?;
            let stopped = engine.stop(&teacher).await?;
            Response::Stopped {
                teacher,
                marked: stopped.marked,
            }
        }

        Request::GetToken { teacher, password } => {
            authenticate(state, &teacher, &password).await?;
            let info = engine.get_token(&teacher).await?;
            Response::Token {
                token: info.token,
                expires_in: info.expires_in,
            }
        }

        Request::Mark {
            student,
            network,
            token,
            teacher,
        } => {
            engine.mark(&teacher, &student, &network, &token).await?;
            Response::Marked { student }
        }

        Request::ListAttendance { teacher, password } => {
            authenticate(state, &teacher, &password).await?;
            let list = engine.list_attendance(&teacher).await?;
            Response::Attendance {
                teacher,
                active: list.active,
                students: list.student_ids,
                started_at: list.started_at,
                closed_at: list.closed_at,
            }
        }

        Request::Ping { client_time } => Response::Pong {
            client_time,
            server_time: start.elapsed().as_millis() as u64,
        },
    };

    Ok(response)
}

async fn authenticate<A, S, C>(
    state: &ServerState<A, S, C>,
    teacher: &TeacherId,
    password: &str,
) -> Result<(), SessionError>
where
    A: Authenticator,
    S: RecordStore,
    C: Codec,
{
    if teacher.is_blank() {
        return Err(SessionError::Validation("missing teacher".into()));
    }
    if password.is_empty() {
        return Err(SessionError::Validation("missing password".into()));
    }
    state.auth.authenticate(teacher, password).await
}

/// HTTP-style status for each failure.
pub(crate) fn status_code(err: &SessionError) -> u16 {
    match err {
        SessionError::AuthFailed(_) => 401,
        SessionError::TeacherExists(_)
        | SessionError::AlreadyActive(_)
        | SessionError::DuplicateMark(_) => 409,
        SessionError::StoreUnavailable(_) => 503,
        SessionError::Validation(_)
        | SessionError::NoActiveSession(_)
        | SessionError::TokenExpired
        | SessionError::InvalidToken
        | SessionError::InvalidNetwork => 400,
    }
}

fn session_error_reply(err: &SessionError) -> Response {
    error_reply(status_code(err), err.kind(), &err.to_string())
}

fn error_reply(code: u16, kind: &str, message: &str) -> Response {
    Response::Error {
        code,
        kind: kind.to_string(),
        message: message.to_string(),
    }
}

/// Wraps `response` in an envelope and sends it.
async fn send(
    conn: &WebSocketConnection,
    codec: &impl Codec,
    seq: u64,
    response: Response,
    start: &Instant,
) -> Result<(), RollcallError> {
    let envelope = Envelope {
        seq,
        timestamp: start.elapsed().as_millis() as u64,
        payload: Payload::Response(response),
    };
    let bytes = codec.encode(&envelope)?;
    conn.send(&bytes).await.map_err(RollcallError::Transport)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use rollcall_protocol::StudentId;

    use super::*;

    #[test]
    fn test_status_code_auth_is_401() {
        let err = SessionError::AuthFailed("bad".into());
        assert_eq!(status_code(&err), 401);
    }

    #[test]
    fn test_status_code_conflicts_are_409() {
        assert_eq!(status_code(&SessionError::DuplicateMark(StudentId::from("S1"))), 409);
        assert_eq!(status_code(&SessionError::AlreadyActive(TeacherId::from("a"))), 409);
        assert_eq!(status_code(&SessionError::TeacherExists(TeacherId::from("a"))), 409);
    }

    #[test]
    fn test_status_code_store_outage_is_503() {
        let err = SessionError::StoreUnavailable("down".into());
        assert_eq!(status_code(&err), 503);
    }

    #[test]
    fn test_session_error_reply_carries_kind() {
        let reply = session_error_reply(&SessionError::TokenExpired);
        assert_eq!(
            reply,
            Response::Error {
                code: 400,
                kind: "TokenExpired".into(),
                message: "token has expired".into(),
            }
        );
    }
}
