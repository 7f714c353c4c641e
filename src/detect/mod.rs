pub mod debounce;
pub mod stable;

pub use debounce::{DebounceConfig, DebouncePolicy, Debouncer};
pub use stable::{stable, StableCondition, StablePoll};
