//! Install directory state: the update lock, the installed version record and
//! the payload swap.

mod lock;
mod record;
mod replacer;

pub use lock::{LOCK_FILE_NAME, UpdateLock};
pub use record::{InstalledVersionRecord, compute_sha256};
pub use replacer::{InstallDirectoryReplacer, STAGING_PREFIX, SWAP_JOURNAL_NAME};
