pub mod allergy;
pub mod drug;
pub mod enums;
pub mod profile;
pub mod rule;

pub use allergy::*;
pub use drug::*;
pub use profile::*;
pub use rule::*;
