//! Client side of shellcache.
//!
//! [`fetch`] is the network boundary and [`worker`] is the request-routing
//! worker that sits in front of it.

pub mod fetch;
pub mod worker;

pub use fetch::{FetchClient, FetchConfig, Network, UrlError, resolve};
pub use worker::{
    ActivationReport, ClientRegistry, InstallOutcome, Interception, MessageOutcome, PrecacheReport, Worker,
    WorkerMessage, WorkerState,
};
