//! rangeforge - declarative cyber-range scenario deployer.
//!
//! A scenario is a JSON (or YAML) document describing networks, hosts,
//! services, vulnerabilities, and flags. This library turns such a
//! document into a correct, safe, ordered stream of container-runtime
//! operations and optionally executes it:
//!
//! 1. [`validator`] - schema conformance and reference integrity over the
//!    scenario graph.
//! 2. [`planner`] - conflict detection, dependency resolution, and
//!    topological ordering with type-priority tie-breaking.
//! 3. [`provisioner`] - translation of the plan into a typed operation
//!    stream, idempotent reconciliation against live state, and
//!    concurrent wave-based execution with health-gated fan-out.
//!
//! The container runtime is abstracted behind the
//! [`Executor`](provisioner::Executor) port; the core never shells out
//! directly.

pub mod cli;
pub mod error;
pub mod observability;
pub mod pipeline;
pub mod planner;
pub mod provisioner;
pub mod scenario;
pub mod validator;
