mod alert;
mod digit;
mod feed;
mod instrument;

pub use alert::AlertRecord;
pub use digit::{Digit, DigitOutOfRange};
pub use feed::{ConnectionState, FeedEvent, Tick};
pub use instrument::Instrument;
