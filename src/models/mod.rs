//! Data models

mod audit;
mod device;
mod monitoring;
mod request;
mod response;
mod user;

pub use audit::*;
pub use device::*;
pub use monitoring::*;
pub use request::*;
pub use response::*;
pub use user::*;
