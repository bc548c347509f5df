//! BDD step definitions for volume lifecycle behaviour.

use std::collections::HashMap;
use std::future::Future;

use azfile_driver::metadata::{MetadataStore, validate_options};
use azfile_driver::test_support::{Behaviour, share_options};
use azfile_driver::{DriverError, MetadataError};
use camino::Utf8PathBuf;
use rstest_bdd_macros::{given, then, when};
use tokio::runtime::Runtime;

use super::test_helpers::{LifecycleContext, StepOutcome};

#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("assertion failed: {0}")]
    Assertion(String),
}

fn block_on<F: Future>(future: F) -> F::Output {
    Runtime::new()
        .unwrap_or_else(|err| panic!("runtime should start: {err}"))
        .block_on(future)
}

fn outcome_of<T>(
    result: Result<T, DriverError>,
    into_path: impl FnOnce(T) -> Option<Utf8PathBuf>,
) -> StepOutcome {
    match result {
        Ok(value) => StepOutcome::Success(into_path(value)),
        Err(err) => StepOutcome::Failure(err.to_string()),
    }
}

#[given("a volume driver for account \"{account}\"")]
fn volume_driver(mut lifecycle_context: LifecycleContext, account: String) -> LifecycleContext {
    lifecycle_context.account = account.trim().to_owned();
    lifecycle_context
}

#[given("shares are removed with their volumes")]
fn shares_removed(mut lifecycle_context: LifecycleContext) -> LifecycleContext {
    lifecycle_context.remove_shares = true;
    lifecycle_context
}

#[given("metadata is purged with its volumes")]
fn metadata_purged(mut lifecycle_context: LifecycleContext) -> LifecycleContext {
    lifecycle_context.purge_metadata = true;
    lifecycle_context
}

#[given("unmounting fails")]
fn unmounting_fails(lifecycle_context: LifecycleContext) -> LifecycleContext {
    lifecycle_context
        .mounter
        .set_unbind_behaviour(Behaviour::Fail);
    lifecycle_context
}

#[given("volume \"{name}\" was recorded by account \"{account}\" for share \"{share}\"")]
fn volume_recorded_elsewhere(
    lifecycle_context: LifecycleContext,
    name: String,
    account: String,
    share: String,
) -> LifecycleContext {
    let mut record = validate_options(&share_options(share.trim()))
        .unwrap_or_else(|err| panic!("share options should validate: {err}"));
    record.account = account.trim().to_owned();
    lifecycle_context
        .open_store()
        .put(name.trim(), &record)
        .unwrap_or_else(|err| panic!("record should be stored: {err}"));
    lifecycle_context
}

#[when("I create volume \"{name}\" on share \"{share}\"")]
fn create_volume(
    mut lifecycle_context: LifecycleContext,
    name: String,
    share: String,
) -> LifecycleContext {
    let options = share_options(share.trim());
    let driver = lifecycle_context.driver();
    let outcome = outcome_of(block_on(driver.create(name.trim(), &options)), |()| None);
    lifecycle_context.outcome = Some(outcome);
    lifecycle_context
}

#[when("I create volume \"{name}\" without options")]
fn create_volume_without_options(
    mut lifecycle_context: LifecycleContext,
    name: String,
) -> LifecycleContext {
    let options = HashMap::new();
    let driver = lifecycle_context.driver();
    let outcome = outcome_of(block_on(driver.create(name.trim(), &options)), |()| None);
    lifecycle_context.outcome = Some(outcome);
    lifecycle_context
}

#[when("I mount volume \"{name}\"")]
fn mount_volume(mut lifecycle_context: LifecycleContext, name: String) -> LifecycleContext {
    let driver = lifecycle_context.driver();
    let outcome = outcome_of(block_on(driver.mount(name.trim())), Some);
    lifecycle_context.outcome = Some(outcome);
    lifecycle_context
}

#[when("I unmount volume \"{name}\"")]
fn unmount_volume(mut lifecycle_context: LifecycleContext, name: String) -> LifecycleContext {
    let driver = lifecycle_context.driver();
    let outcome = outcome_of(block_on(driver.unmount(name.trim())), |()| None);
    lifecycle_context.outcome = Some(outcome);
    lifecycle_context
}

#[when("I remove volume \"{name}\"")]
fn remove_volume(mut lifecycle_context: LifecycleContext, name: String) -> LifecycleContext {
    let driver = lifecycle_context.driver();
    let outcome = outcome_of(block_on(driver.remove(name.trim())), |()| None);
    lifecycle_context.outcome = Some(outcome);
    lifecycle_context
}

#[then("the operation succeeds")]
fn operation_succeeds(lifecycle_context: &LifecycleContext) -> Result<(), StepError> {
    match &lifecycle_context.outcome {
        Some(StepOutcome::Success(_)) => Ok(()),
        Some(StepOutcome::Failure(message)) => Err(StepError::Assertion(format!(
            "expected success, got failure: {message}"
        ))),
        None => Err(StepError::Assertion(String::from("missing outcome"))),
    }
}

#[then("the operation returns the mountpoint for \"{name}\"")]
fn operation_returns_mountpoint(
    lifecycle_context: &LifecycleContext,
    name: String,
) -> Result<(), StepError> {
    let expected = lifecycle_context.mountpoint(name.trim());
    match &lifecycle_context.outcome {
        Some(StepOutcome::Success(Some(path))) if *path == expected => Ok(()),
        other => Err(StepError::Assertion(format!(
            "expected mountpoint {expected}, got {other:?}"
        ))),
    }
}

#[then("the operation fails with \"{expected}\"")]
fn operation_fails(lifecycle_context: &LifecycleContext, expected: String) -> Result<(), StepError> {
    match &lifecycle_context.outcome {
        Some(StepOutcome::Failure(message)) if message.contains(expected.trim()) => Ok(()),
        other => Err(StepError::Assertion(format!(
            "expected failure containing '{expected}', got {other:?}"
        ))),
    }
}

#[then("share \"{share}\" exists")]
fn share_exists(lifecycle_context: &LifecycleContext, share: String) -> Result<(), StepError> {
    if lifecycle_context.shares.exists(share.trim()) {
        Ok(())
    } else {
        Err(StepError::Assertion(format!("share {share} is missing")))
    }
}

#[then("share \"{share}\" does not exist")]
fn share_absent(lifecycle_context: &LifecycleContext, share: String) -> Result<(), StepError> {
    if lifecycle_context.shares.exists(share.trim()) {
        Err(StepError::Assertion(format!("share {share} still exists")))
    } else {
        Ok(())
    }
}

#[then("no share was touched")]
fn no_share_touched(lifecycle_context: &LifecycleContext) -> Result<(), StepError> {
    let ensured = lifecycle_context.shares.ensure_calls();
    let deleted = lifecycle_context.shares.delete_calls();
    if ensured.is_empty() && deleted.is_empty() {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "unexpected share calls: ensured {ensured:?}, deleted {deleted:?}"
        )))
    }
}

#[then("volume \"{name}\" is recorded for share \"{share}\" on account \"{account}\"")]
fn volume_recorded(
    lifecycle_context: &LifecycleContext,
    name: String,
    share: String,
    account: String,
) -> Result<(), StepError> {
    let record = lifecycle_context
        .open_store()
        .get(name.trim())
        .map_err(|err| StepError::Assertion(err.to_string()))?;
    if record.share() == share.trim() && record.account == account.trim() {
        Ok(())
    } else {
        Err(StepError::Assertion(format!("unexpected record: {record:?}")))
    }
}

#[then("volume \"{name}\" is not recorded")]
fn volume_not_recorded(lifecycle_context: &LifecycleContext, name: String) -> Result<(), StepError> {
    match lifecycle_context.open_store().get(name.trim()) {
        Err(MetadataError::NotFound { .. }) => Ok(()),
        other => Err(StepError::Assertion(format!(
            "expected no record, got {other:?}"
        ))),
    }
}

#[then("share \"{share}\" is bound at the mountpoint for \"{name}\"")]
fn share_bound(
    lifecycle_context: &LifecycleContext,
    share: String,
    name: String,
) -> Result<(), StepError> {
    let expected = lifecycle_context.mountpoint(name.trim());
    let binds = lifecycle_context.mounter.binds();
    let matched = binds.iter().any(|bind| {
        bind.share == share.trim()
            && bind.account == lifecycle_context.account
            && bind.path == expected.as_str()
    });
    if matched {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "no bind of {share} at {expected}: {binds:?}"
        )))
    }
}

#[then("nothing was bound")]
fn nothing_bound(lifecycle_context: &LifecycleContext) -> Result<(), StepError> {
    let binds = lifecycle_context.mounter.binds();
    if binds.is_empty() {
        Ok(())
    } else {
        Err(StepError::Assertion(format!("unexpected binds: {binds:?}")))
    }
}

#[then("the mountpoint for \"{name}\" is absent")]
fn mountpoint_absent(lifecycle_context: &LifecycleContext, name: String) -> Result<(), StepError> {
    let path = lifecycle_context.mountpoint(name.trim());
    if path.exists() {
        Err(StepError::Assertion(format!("{path} still exists")))
    } else {
        Ok(())
    }
}

#[then("the mountpoint for \"{name}\" exists")]
fn mountpoint_exists(lifecycle_context: &LifecycleContext, name: String) -> Result<(), StepError> {
    let path = lifecycle_context.mountpoint(name.trim());
    if path.is_dir() {
        Ok(())
    } else {
        Err(StepError::Assertion(format!("{path} is missing")))
    }
}
