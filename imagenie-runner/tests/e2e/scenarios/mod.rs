//! E2E test scenarios.

mod cancellation;
mod db_preparation;
mod discovery;
mod fault_isolation;
mod idempotence;
mod pipeline_flow;
