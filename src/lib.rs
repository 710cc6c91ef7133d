//! Live proctoring session broker.
//!
//! A signaling relay pairs one candidate with any number of viewers per
//! interview session, and a report builder turns the detector events recorded
//! during the interview into a debounced integrity score.

pub mod configuration;
pub mod controller;
pub mod error_handling;
pub mod negotiation;
pub mod scoring;
pub mod session_management;
pub mod signaling;
pub mod storage;
pub mod web_interface;
