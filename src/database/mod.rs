mod driver;
mod mongodump;

pub use driver::{DumpOutput, DumpProducer};
pub use mongodump::MongoDumpProducer;

use crate::config::DumpConfig;

pub fn create_producer(config: &DumpConfig) -> Box<dyn DumpProducer> {
    Box::new(MongoDumpProducer::new(config))
}
