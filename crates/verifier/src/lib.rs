//! # graphfetch-verifier
//!
//! Checks that selective entity graphs propagate eagerness per path: a
//! User with a `department` and a `related_departments` collection, both
//! leading to `Department.company`, is loaded under several fetch plans and
//! the materialized associations are compared with what each plan asks for.

pub mod dataset;
pub mod entities;
pub mod error;
pub mod report;
pub mod telemetry;
pub mod verifier;

pub use dataset::{FixedDataset, USER_ID};
pub use entities::{register_entities, Company, Department, User};
pub use error::{VerifierError, VerifierResult};
pub use report::LoadReport;
pub use telemetry::{init_logging, LoggingConfig};
pub use verifier::{FetchPlanVerifier, Scenario, JOIN_FETCH_QUERY};
