pub mod address;
pub mod draft;
pub mod user;
pub mod verification;

pub use address::*;
pub use draft::*;
pub use user::*;
pub use verification::*;
