pub mod flags;
pub mod kind;
pub mod topo_name;
pub mod txn;

pub use flags::*;
pub use kind::*;
pub use topo_name::*;
pub use txn::*;
