//! End-to-end tests: mock exchanges driven through the scanners, the
//! scan loop and the CSV report sink.

mod mock_exchange;
mod scan_cycle;
