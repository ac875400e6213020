//! Policy snapshots on disk.
//!
//! A snapshot is a pair of files sharing a stem: `<stem>.json` with the
//! architecture and `<stem>.bin` with the parameter record.

pub mod snapshot;

pub use snapshot::{
    load_policy, read_snapshot, reconcile_policy_config, save_policy, snapshot_exists, with_suffix,
    PolicySnapshot,
};
