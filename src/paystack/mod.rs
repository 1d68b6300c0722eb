pub mod client;

pub use client::{ChargeVerification, InitializedPayment, PaystackClient, PaystackError};
