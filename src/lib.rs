pub mod audio;
pub mod config;
pub mod error;
pub mod http;
pub mod model;
pub mod providers;
pub mod session;
pub mod store;

pub use audio::{AudioData, AudioFramer};
pub use config::Config;
pub use error::{PitchroomError, Result};
pub use http::{create_router, AppState};
pub use session::{Orchestrator, SessionRegistry, StopReason};
pub use store::Repositories;
