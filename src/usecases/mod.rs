//! Use Cases Layer - Settlement Workflows
//!
//! Orchestrates the currency and bundler ports into the client's
//! settlement operations. Each use case is a self-contained business
//! operation.
//!
//! Use cases:
//! - `ConfirmationTracker`: broadcast → confirmed state machine
//! - `FundingCoordinator`: transfer funds to the bundler with one fee bump
//! - `WithdrawalCoordinator`: signed withdrawal requests

pub mod confirmation;
pub mod funding;
pub mod withdrawal;

pub use confirmation::{ConfirmationTracker, PollConfig};
pub use funding::{FundingConfig, FundingCoordinator, FundingReceipt, FundingRequest, FundingStatus};
pub use withdrawal::{WithdrawalCoordinator, WithdrawalRequest};
