// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Tracing setup for test binaries.

use tracing_subscriber::EnvFilter;

/// Installs a fmt subscriber that writes through the test harness's
/// captured output.
///
/// The filter is read from `RUST_LOG` and defaults to `warn`. Calling this
/// more than once, or after another subscriber was installed, is a no-op.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}
