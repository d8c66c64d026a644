pub mod captcha_client;
pub mod portal_client;

pub use captcha_client::{CaptchaClient, CaptchaError};
pub use portal_client::PortalClient;
