pub mod login;
pub mod result;
pub mod session;

pub use login::{CaptchaChallenge, Credentials, LoginPageContext, SubmitResponse};
pub use result::AutomationResult;
pub use session::{parse_set_cookie, SessionRecord, SessionState};
