//! BDD scenarios for the volume lifecycle.

use rstest_bdd_macros::scenario;

use super::test_helpers::{LifecycleContext, lifecycle_context};

#[scenario(
    path = "tests/features/lifecycle.feature",
    name = "Create, mount, unmount, and remove a volume"
)]
fn scenario_full_lifecycle(lifecycle_context: LifecycleContext) {
    let _ = lifecycle_context;
}

#[scenario(
    path = "tests/features/lifecycle.feature",
    name = "Reject creation without a share"
)]
fn scenario_missing_share(lifecycle_context: LifecycleContext) {
    let _ = lifecycle_context;
}

#[scenario(
    path = "tests/features/lifecycle.feature",
    name = "Refuse to mount a volume owned by another account"
)]
fn scenario_foreign_volume(lifecycle_context: LifecycleContext) {
    let _ = lifecycle_context;
}

#[scenario(
    path = "tests/features/lifecycle.feature",
    name = "Keep the mountpoint when unmounting fails"
)]
fn scenario_unmount_failure(lifecycle_context: LifecycleContext) {
    let _ = lifecycle_context;
}

#[scenario(
    path = "tests/features/lifecycle.feature",
    name = "Keep the share and metadata by default"
)]
fn scenario_default_retention(lifecycle_context: LifecycleContext) {
    let _ = lifecycle_context;
}

#[scenario(
    path = "tests/features/lifecycle.feature",
    name = "Purge metadata when configured"
)]
fn scenario_purge_metadata(lifecycle_context: LifecycleContext) {
    let _ = lifecycle_context;
}
