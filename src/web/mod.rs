//! Handler registration, request binding and response normalization.

pub mod binding;
pub mod reply;
pub mod router;

pub use binding::{Binding, Call, RequestContext};
pub use reply::{normalize, Reply};
pub use router::{get, post, RouteDef, RouteTable};
