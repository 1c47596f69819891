//! Greeter server: one greeting command exposed over a line pipe, HTTP and
//! gRPC, each run under a lifecycle supervisor with a bounded drain.

pub mod config;
pub mod lifecycle;
pub mod transport;

pub use config::{HttpConfig, NetworkFamily, RpcConfig, SupervisorConfig};
pub use lifecycle::{
    LifecycleContext, LifecycleError, LifecycleState, Outcome, RunningServer, Supervisor,
};
pub use transport::{BoundEndpoint, Transport, TransportError};

#[cfg(test)]
mod tests {
    #[test]
    fn crate_loads() {
        // Empty body: if this test runs, the crate compiles and loads.
    }
}
