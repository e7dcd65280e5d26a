pub mod connection;
pub mod dispatcher;
pub mod registry;
pub mod session;

pub use dispatcher::{DispatchError, Dispatcher};
pub use registry::{Audience, SessionRegistry};
pub use session::{ConnId, Outbound, SessionState};
