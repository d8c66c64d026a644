pub mod login_flow;

pub use login_flow::{detect_login_success, LoginFlow};
