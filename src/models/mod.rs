pub mod batch_range;
pub mod listing;
pub mod outcome;

pub use batch_range::BatchRange;
pub use listing::ListingRecord;
pub use outcome::ProcessOutcome;
