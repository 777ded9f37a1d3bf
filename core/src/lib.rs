pub mod channel;
pub mod collector;
pub mod config;
pub mod errors;
pub mod exposition;
pub mod parsers;
pub mod preread;
pub mod reader;

pub use collector::NodeCollector;
