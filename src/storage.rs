pub mod directory;
pub mod file;
mod record;

pub use directory::{Directory, DirectoryLoadError};
pub use file::{DocumentFile, Format, LoadError, SaveError};
pub use record::{DatasetRecord, RecordError};
