//! Agent lifecycle: explicit construction and teardown of the process-wide
//! store and reporter

mod agent;
mod builder;

pub use agent::Agent;
pub use builder::AgentBuilder;
