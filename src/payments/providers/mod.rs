pub mod abacatepay;

pub use abacatepay::AbacatePayProvider;
