pub mod batch;
pub mod config;
pub mod errors;
pub mod model;
pub mod pipeline;
pub mod protocol;
pub mod providers;
pub mod report;
pub mod stages;
