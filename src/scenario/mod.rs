//! Scenario document model and loading.

pub mod loader;
pub mod schema;

pub use loader::{load_scenario, parse_scenario};
pub use schema::{
    Difficulty, Flag, FlagPlacement, Healthcheck, Host, HostResources, HostType, Metadata,
    Network, NetworkAttachment, NetworkType, PlacementDetails, Port, Protocol, Scenario, Service,
    Volume, Vulnerability,
};
