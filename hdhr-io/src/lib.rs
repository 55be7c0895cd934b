//! HDHR I/O and Platform Abstraction
//!
//! This crate provides the network and platform pieces the protocol layers
//! are built on: UDP and TCP socket wrappers with explicit timeouts, local
//! interface enumeration, clocks and deadlines, and the injectable log sink.

pub mod interfaces;
pub mod log;
pub mod socket;
pub mod time;

pub use interfaces::{local_ipv4_interfaces, LocalInterface};
pub use log::{LogSink, Logger, MemorySink, TracingSink};
pub use socket::{resolve_ipv4, SocketError, TcpSock, UdpSock};
pub use time::{sleep_minimum, Clock, Deadline, SimulatedClock, SystemClock, Timer};
