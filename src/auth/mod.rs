/// Authentication primitives.
///
/// Token minting/verification and password hashing. Session-level
/// concerns (the store check, role gating) live in the middleware.

mod claims;
mod jwt;
mod password;

pub use claims::Claims;
pub use jwt::TokenCodec;
pub use password::hash_password;
pub use password::verify_password;
