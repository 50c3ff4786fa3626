pub mod action;
pub mod blob;
pub mod blob_detector;
pub mod gesture;
pub mod shape_metrics;
pub mod threshold;
pub mod trail;
