pub mod network;
pub mod transaction;

pub use network::Network;
pub use transaction::{ConfirmationMethod, PaymentOutcome, TransactionStatus};
