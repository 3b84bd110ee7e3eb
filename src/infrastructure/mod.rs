pub mod directories;
pub mod logging;
pub mod shutdown;
pub mod writer_lock;
