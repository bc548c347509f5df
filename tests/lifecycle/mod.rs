//! Lifecycle scenarios driven through the public driver API with in-memory
//! share and mount doubles and a file-backed metadata store.

mod bdd_steps;
mod scenarios;
mod test_helpers;
