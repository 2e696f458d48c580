//! Facade crate re-exporting the `loam` domain libraries for consumers who
//! want the whole engine behind one dependency.

pub use loam_core::*;

pub mod prelude {
    pub use loam_core::error::LoamError;
    pub use loam_core::Repo;
    pub use loam_signing::SigningCapability;
    pub use loam_store::Store;
}
