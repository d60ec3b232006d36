pub mod inspect;
pub mod job;
pub mod naming;

pub use job::{execute_backup, execute_backup_at, BackupReport};
