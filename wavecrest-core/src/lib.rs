mod clock;
mod config;
mod constants;
mod credentials;
mod event;
mod histogram;
mod publisher;
mod stats;

pub use clock::*;
pub use config::*;
pub use constants::*;
pub use credentials::*;
pub use event::*;
pub use histogram::*;
pub use publisher::*;
pub use stats::*;
