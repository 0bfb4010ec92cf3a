pub mod credentials;
pub mod loader;
pub mod model;

pub use credentials::{ConnectionTarget, Credentials};
pub use loader::ConfigLoader;
pub use model::MigratorConfig;
