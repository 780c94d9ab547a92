//! Referral lifecycle and commission settlement engine.
//!
//! The marketplace routes sales leads ("referrals") to supply partners and
//! tracks each one through a negotiation lifecycle under an acknowledgment
//! SLA. This crate owns the state machine, the commission arithmetic, the
//! SLA monitor, and the service façade; persistence and outbound delivery
//! are ports implemented by the hosting service.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
