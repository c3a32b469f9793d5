//! Core engine: the scan → report → sleep loop and the two scanners it drives.

pub mod ledger;
pub mod scan_loop;
pub mod simple;
pub mod triangular;
