pub mod node;
pub mod provider;
pub mod providers;
pub mod snapshot;
pub mod view;
