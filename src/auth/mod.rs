//! Authentication module
//!
//! Service Layer uses session authentication: a `POST /Login` with the company
//! database and user credentials returns a `SessionId`, which is then sent as
//! the `B1SESSION` cookie on every request.
//!
//! The `SessionAuthenticator` logs in lazily on first use and caches the
//! session for the rest of the run.

mod session;

pub use session::{redact_session, Credentials, Session, SessionAuthenticator, SESSION_COOKIE};
