//! Repository layer: table-scoped database operations over a borrowed
//! `Connection`. All public functions are re-exported here.

mod audit;
mod drug;
mod patient;
mod prescription;
mod rules;

pub use audit::*;
pub use drug::*;
pub use patient::*;
pub use prescription::*;
pub use rules::*;
