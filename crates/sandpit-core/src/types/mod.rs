mod analysis;
mod common;
mod environment;
mod status;
mod user;

pub use analysis::*;
pub use common::*;
pub use environment::*;
pub use status::*;
pub use user::*;
