//! Records exchanged with the booking backend.
//!
//! All records are backend-owned; the client only originates the `New*`
//! request shapes.

pub mod appointment;
pub mod doctor;
pub mod identity;
pub mod prescription;

pub use appointment::{Appointment, NewAppointment};
pub use doctor::{Doctor, DoctorUpdate, NewDoctor};
pub use identity::Identity;
pub use prescription::{Medication, NewPrescription, Prescription};
