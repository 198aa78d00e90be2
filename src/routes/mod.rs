mod account;
mod health_check;

pub use account::{am_i_admin, change_password, create_user, get_users, login, refresh_token};
pub use health_check::health_check;
