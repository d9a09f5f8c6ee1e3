pub mod cooldown;
pub mod listing_parser;
pub mod record_writer;

pub use cooldown::CooldownPolicy;
pub use record_writer::RecordWriter;
