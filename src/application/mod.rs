pub mod bootstrap;
pub mod error;
pub mod reconciler;
