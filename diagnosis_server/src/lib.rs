//! Webcam diagnosis demo: classify camera frames and type out a diagnosis in the browser.
pub mod alert;
pub mod config;
pub mod diagnosis;
pub mod endpoints;
pub mod meter;
pub mod nn;
pub mod presenter;
pub mod session;
pub mod surface;
pub mod typing;

pub use common::Error;
