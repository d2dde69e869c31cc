pub mod bundle;
pub mod derivation;
pub mod digest;
pub mod error;
pub mod reconciliation;
pub mod workload;
