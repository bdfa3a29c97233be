pub mod me;
pub mod registration;
pub mod session;

pub use me::me;
pub use registration::register;
pub use session::{login, logout, logout_all, logout_other, refresh};
