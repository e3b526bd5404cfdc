pub mod config;
pub mod database;
pub mod payments;
pub mod services;
pub mod workers;

pub use payments::error::{PaymentError, PaymentResult};
pub use payments::types::{Billing, Customer, PixStatus};
pub use services::checkout::{CheckoutService, CheckoutState};
