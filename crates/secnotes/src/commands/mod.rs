pub mod import;
pub mod init;
pub mod note;
pub mod sync;
pub mod trail;
pub mod watch;
