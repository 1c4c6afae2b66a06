/*! Integration tests for ranklist.
 *
 * This test suite is organized as a single integration test binary
 * following the pattern described by matklad in
 * https://matklad.github.io/2021/02/27/delete-cargo-integration-tests.html
 *
 * The module structure mirrors the main library structure:
 * - manager: explicit moves, list queries and the ordering properties they keep
 * - lifecycle: create/save/delete through the hooks, scope changes, direct positions
 * - backend: transaction atomicity and the SQL store
 * - errors: scope and storage errors surfaced by operations
 *
 * Every test runs against the store chosen by TEST_BACKEND (see `helpers::test_store`).
 */

use tracing_subscriber::EnvFilter;

#[ctor::ctor]
fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("ranklist=info".parse().unwrap()),
        )
        .with_test_writer()
        .try_init();
}

mod backend;
mod lifecycle;
