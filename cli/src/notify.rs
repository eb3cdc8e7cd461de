//! Toast-style notifications printed after an action completes.

use colored::*;
use common::ValidationErrors;
use statuspage_client::StoreError;

pub fn success(message: &str) {
    println!("{} {}", "✅".green(), message.bright_green().bold());
}

pub fn error(message: &str) {
    eprintln!("{} {}", "❌ Error:".red().bold(), message.red());
}

pub fn hint(message: &str) {
    println!("{}", message.dimmed());
}

/// One line per offending field, shown next to the form.
pub fn field_errors(errors: &ValidationErrors) {
    for e in errors.errors() {
        eprintln!("   {} {}", format!("{}:", e.field).yellow().bold(), e.message.yellow());
    }
}

pub fn store_error(context: &str, err: &StoreError) {
    match err {
        StoreError::Validation(errors) => {
            error(&format!("{}: please fix the highlighted fields", context));
            field_errors(errors);
        }
        StoreError::NoOrganization | StoreError::NotFound(_) | StoreError::Api(_) => error(&format!("{}: {}", context, err)),
    }
}
