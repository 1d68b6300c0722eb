pub mod client;

pub use client::{AccountBalance, OperatorId, OperatorMap, ReloadlyClient, ReloadlyError};
