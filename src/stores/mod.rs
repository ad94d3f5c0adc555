//! Client-side state: the session and the cached entity collections.
//!
//! Each store owns its in-memory state and writes every mutation through to
//! the cache it was constructed with.

pub mod categories;
pub mod session;
pub mod tickets;
pub mod users;

pub use categories::CategoryStore;
pub use session::{ProfileUpdate, Route, SessionStore};
pub use tickets::TicketStore;
pub use users::UserStore;

use color_eyre::Result;

/// Record the outcome of a store operation in its `error` slot.
///
/// Failures keep `context` as the user-facing message; the underlying error
/// is logged and handed back to the caller.
fn track<T>(error: &mut Option<String>, context: &str, result: Result<T>) -> Result<T> {
  match &result {
    Ok(_) => *error = None,
    Err(e) => {
      tracing::error!(error = %e, "{}", context);
      *error = Some(context.to_string());
    }
  }
  result
}
