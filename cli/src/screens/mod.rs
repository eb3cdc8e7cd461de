pub mod incidents;
pub mod landing;
pub mod live;
pub mod overview;
pub mod public_status;
pub mod services;
pub mod setup;
pub mod sign_in;

use anyhow::Result;
use colored::*;
use inquire::InquireError;

/// Esc and Ctrl-C inside a prompt cancel the form rather than fail.
pub(crate) fn answered<T>(result: Result<T, InquireError>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(InquireError::OperationCanceled) | Err(InquireError::OperationInterrupted) => {
            println!("{}", "Cancelled.".dimmed());
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

pub(crate) fn loading(what: &str) {
    println!("{}", format!("Loading {}...", what).dimmed());
}
