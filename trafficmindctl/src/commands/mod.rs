pub mod analyze;

pub use analyze::{load_upload, AnalyzeArgs, ConsoleStatus};
