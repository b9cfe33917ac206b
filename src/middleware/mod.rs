/// Middleware module
///
/// Session guard for private routes and per-request logging.

mod request_logger;
mod session_guard;

pub use request_logger::RequestLogger;
pub use session_guard::{check, extract_token, GuardOutcome, SessionGuard};
