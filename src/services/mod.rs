pub mod purchase;

pub use purchase::{BalanceReport, InitiatedPurchase, PurchaseService};
