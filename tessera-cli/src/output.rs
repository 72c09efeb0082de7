//! Terminal output for the `tessera` commands.
//!
//! Everything goes to stdout except [`error`], so `tessera schema` output can
//! be piped while failures still reach the terminal.

use std::path::Path;

use owo_colors::OwoColorize;
use tessera_migrate::{MigrationRecord, SchemaOperation};

/// Print a command title.
pub fn header(text: &str) {
    println!();
    println!("{}", text.bold().cyan());
    println!("{}", "─".repeat(text.chars().count()).dimmed());
    println!();
}

pub fn section(text: &str) {
    println!("{}", text.bold().white());
}

/// Print an indented `key: value` line.
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

pub fn path(key: &str, path: &Path) {
    kv(key, &path.display().to_string());
}

pub fn success(text: &str) {
    println!("{} {}", "✔".green().bold(), text.green());
}

pub fn info(text: &str) {
    println!("{} {}", "ℹ".blue().bold(), text);
}

pub fn warn(text: &str) {
    println!("{} {}", "⚠".yellow().bold(), text.yellow());
}

/// Print an error to stderr.
pub fn error(text: &str) {
    eprintln!("{} {}", "✖".red().bold(), text.red());
}

pub fn newline() {
    println!();
}

pub fn dim(text: &str) {
    println!("{}", text.dimmed());
}

/// Marker shown before an operation: `+` adds, `-` removes, `~` changes in
/// place.
pub fn operation_marker(op: &SchemaOperation) -> char {
    match op {
        SchemaOperation::CreateTable { .. }
        | SchemaOperation::AddColumn { .. }
        | SchemaOperation::AddIndex { .. }
        | SchemaOperation::AddAssociation { .. } => '+',
        SchemaOperation::DropTable { .. }
        | SchemaOperation::DropColumn { .. }
        | SchemaOperation::DropIndex { .. }
        | SchemaOperation::DropAssociation { .. } => '-',
        SchemaOperation::AlterColumn { .. } | SchemaOperation::MoveColumn { .. } => '~',
    }
}

/// Print one operation of a migration, destructive ones in red.
pub fn operation(op: &SchemaOperation) {
    let description = op.describe();
    match operation_marker(op) {
        marker if op.is_destructive() => {
            println!("  {} {}", marker.red().bold(), description.red())
        }
        '+' => println!("  {} {}", "+".green().bold(), description),
        marker => println!("  {} {}", marker.yellow().bold(), description),
    }
}

/// Print a history entry with its applied state.
pub fn record(number: usize, record: &MigrationRecord) {
    let state = if record.applied {
        "applied".green().to_string()
    } else {
        "pending".yellow().to_string()
    };
    print!("  {}. {} [{}]", number.to_string().dimmed(), record.id, state);
    match &record.description {
        Some(description) => println!(" {}", description.dimmed()),
        None => println!(),
    }
}
