//! DNS resolution into ordered connect candidates
//!
//! A [`Resolve`] implementation turns `host:port` into the ordered list of
//! socket addresses a connection walks through before giving up.

pub mod gai;
pub mod hickory;
pub mod overrides;
pub mod resolve;

pub use gai::GaiResolver;
pub use hickory::HickoryResolver;
pub use overrides::StaticResolver;
pub use resolve::{Name, Resolve, Resolving, ip_literal};
