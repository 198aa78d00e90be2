/// Middleware module
///
/// Access gating for protected and admin-only routes.

mod access_gate;

pub use access_gate::AccessGate;
