//! Types most embedding applications need.

pub use crate::buffer::{BufferChain, Segment, read_segment};
pub use crate::collector::{ChannelCollector, CollectedExchange, Collector, NullCollector};
pub use crate::config::{ConnectConfig, OverloadPolicy, ServerConfig, Validator};
pub use crate::connect::{Connection, ConnectionState, Connector, Scheme};
pub use crate::dns::{GaiResolver, HickoryResolver, Resolve, StaticResolver};
pub use crate::error::{Error, Kind};
pub use crate::handler::{Exchange, HandlerContext, HandlerFactory, RequestHandler, Transcript};
pub use crate::server::{Heartbeat, Server, ShutdownHandle};
pub use crate::telemetry::ServerStatsSnapshot;
pub use crate::tls::{TlsClientConfig, TlsServerConfig};
