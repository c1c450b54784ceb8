pub mod certificate;
pub mod types;
