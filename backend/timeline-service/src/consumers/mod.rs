pub mod firehose;

pub use firehose::{Dispatcher, FirehoseConsumer};
