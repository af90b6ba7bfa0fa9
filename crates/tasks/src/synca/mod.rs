mod counter;
mod drops;
mod signals;
mod waitgroup;

pub use counter::*;
pub use drops::*;
pub use signals::*;
pub use waitgroup::*;
