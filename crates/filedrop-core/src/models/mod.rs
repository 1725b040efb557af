mod file;
mod outcome;
mod property;

pub use file::FileDescriptor;
pub use outcome::{FailureKind, IngestOutcome, PartFailure};
pub use property::PropertyBag;
