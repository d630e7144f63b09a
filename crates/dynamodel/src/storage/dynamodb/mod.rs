//! DynamoDB storage backend implementation.
//!
//! This module provides a DynamoDB-based implementation of the `Store`
//! trait using `aws-sdk-dynamodb`, and the deployment of declared tables:
//! pure plan calculation in [`planning`], execution in [`deploy`].

mod conversions;
pub mod deploy;
mod error;
pub mod planning;
mod store;

pub use deploy::{execute_deploy_plan, get_table_state};
pub use error::{DeployError, DeployResult};
pub use planning::{calculate_deploy_plan, format_deploy_plan, DeployPlan, TableState};
pub use store::{create_client, DynamoDbStore};
