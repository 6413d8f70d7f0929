//! Cookie handling, session extraction and sign-out for dashboard routes.
//!
//! The gatekeeper materializes the session once per request; handlers read
//! it through [`CurrentSession`]. Only a token rejection reported by the
//! downstream API ends a session through [`forced_sign_out`].

mod cookie;
mod errors;
mod extractors;
mod signout;
mod state;

pub use cookie::{
    SESSION_COOKIE_NAME, append_set_cookie, clear_cookie, get_cookie, service_cookie,
};
pub use errors::AuthRedirect;
pub use extractors::CurrentSession;
pub use signout::{SignOutReason, forced_sign_out, sign_out};
pub use state::HasBridgeBackend;
