pub mod puzzle_solver;
pub mod session_store;

pub use puzzle_solver::{restore_case, solve_puzzle};
pub use session_store::{SessionStore, SESSION_TTL_MILLIS};
