#![allow(dead_code)]

use tracing::Level;

pub fn init() {
	// Another test in this binary may have installed the subscriber already.
	let _ = tracing_subscriber::fmt().with_test_writer().with_max_level(Level::TRACE).try_init();
}
