pub mod candle;
pub mod instrument;
pub mod scan;
pub mod signals;

pub use candle::*;
pub use instrument::*;
pub use scan::*;
pub use signals::*;
