pub mod config;
pub mod errors;
pub mod inference;
pub mod mocks;
pub mod presenter;
pub mod routes;
pub mod storage;

pub use config::AppConfig;
pub use errors::AppError;
pub use inference::{SegmentationModel, load_model};
pub use routes::{AppServices, configure_routes};
