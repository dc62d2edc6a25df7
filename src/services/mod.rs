pub mod jwt;
pub mod registry;

pub use jwt::JwtService;
pub use registry::{RegistryError, RegistryService};
