mod bundle;
mod dispatch;
mod lookup;
mod message;
mod result;
mod store;

pub use bundle::*;
pub use dispatch::*;
pub use lookup::*;
pub use message::*;
pub use result::*;
pub use store::*;
