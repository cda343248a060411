//! REST access to the booking backend.

pub mod appointments;
pub mod client;
pub mod doctors;
pub mod envelope;
pub mod error;
pub mod issuer;
pub mod prescriptions;

pub use appointments::AppointmentsApi;
pub use client::ApiClient;
pub use doctors::DoctorsApi;
pub use error::ApiError;
pub use issuer::HttpTokenIssuer;
pub use prescriptions::PrescriptionsApi;
