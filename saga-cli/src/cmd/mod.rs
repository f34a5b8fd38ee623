pub mod config;
pub mod execute;
pub mod plan;
pub mod sagas;
pub mod serve;
pub mod validate;
