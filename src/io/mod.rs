/// CSV result store.
pub mod results;
