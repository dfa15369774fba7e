//! API endpoint modules.

mod analysis;
mod environment;
mod user;

pub use analysis::{AnalysisApi, ListRequestBuilder};
pub use environment::EnvironmentApi;
pub use user::UserApi;
