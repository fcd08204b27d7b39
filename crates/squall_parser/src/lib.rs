pub mod error;
pub mod labels;
pub mod property;
pub mod rewards;
pub mod transitions;

pub use error::ParseError;
pub use labels::LabelFile;
pub use property::{Property, parse_property};
pub use rewards::StateRewardFile;
pub use transitions::TransitionFile;
