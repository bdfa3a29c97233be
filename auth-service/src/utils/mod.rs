pub mod cookies;
pub mod password;
pub mod validation;

pub use cookies::{clear_refresh_cookie, refresh_cookie, refresh_token_from, REFRESH_COOKIE_NAME};
pub use password::{
    hash_password, verify_dummy_password, verify_password, Password, PasswordHashString,
};
pub use validation::ValidatedJson;
