pub mod browse;
pub mod cache;
pub mod edit;
pub mod log;
pub mod observer;

pub use observer::ConsoleObserver;
