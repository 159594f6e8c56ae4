//! Named, typed ports and the links between them.

pub mod dispatch;
pub mod link;
pub mod registry;

pub use dispatch::{InputDispatch, InputHandler, Prepared, TypedInputs};
pub use link::{Link, LinkControl, LinkOp, OutputPort, Subscriber};
pub use registry::{Direction, PortInfo, PortListing, PortRegistry};
