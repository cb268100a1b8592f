mod fs;

pub use fs::{DocumentFs, SHARED_DIR};
