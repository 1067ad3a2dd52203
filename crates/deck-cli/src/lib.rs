//! Agent Deck CLI: argument shapes and command dispatch.
//!
//! The CLI is a thin front-end: it discovers the repository root, loads the
//! configuration, and hands every verb to `deck-core`. Reconciliation runs
//! before any mutating verb from this process.

pub mod commands;

use std::path::PathBuf;

pub use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "deck")]
#[command(about = "Manage parallel coding-agent workspaces")]
#[command(version, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialise the .deck directory in this repository
    Init,
    /// Create a new instance on the given branch
    New {
        branch: String,
        /// Base branch to root a new branch at
        #[arg(short, long, default_value = "")]
        base: String,
        /// Display name; defaults to the branch name
        #[arg(short, long, default_value = "")]
        name: String,
    },
    /// List all instances
    List,
    /// Show the observed status of one instance
    Status { id: String },
    /// Delete an instance and release its resources
    Delete {
        id: String,
        /// Continue past failures to kill the window or remove the worktree
        #[arg(short, long)]
        force: bool,
        /// Also force-delete the instance's branch
        #[arg(long)]
        delete_branch: bool,
    },
    /// Stop the agent process
    Pause { id: String },
    /// Continue a paused agent process
    Resume { id: String },
    /// Attach to the instance's window
    Focus { id: String },
    /// Manage sub-panes of an instance
    Term {
        id: String,
        /// Kill the given pane instead of creating one
        #[arg(long, default_value = "")]
        kill: String,
        /// Label for a newly created pane
        #[arg(short, long, default_value = "shell")]
        label: String,
    },
    /// Show diff statistics against the base branch
    Diff { id: String },
    /// Push the branch and open a review request
    Merge {
        id: String,
        #[arg(short, long, default_value = "")]
        title: String,
        #[arg(short, long, default_value = "")]
        body: String,
        /// Only run the merge probe, publish nothing
        #[arg(long)]
        check: bool,
    },
    /// Manage dependencies between instances
    Depend {
        id: String,
        /// Instance this one depends on
        on: String,
        /// Remove the edge instead of adding it
        #[arg(long)]
        remove: bool,
    },
    /// Repair drift between the store and observed reality
    Reconcile,
    /// Check external tool availability and versions
    Doctor,
    /// Delete every instance and tear down the session
    Kill,
    /// Change an instance's display name
    Rename { id: String, name: String },
}

/// Walk up from the current directory to the first `.git` entry.
pub fn find_repo_root() -> anyhow::Result<PathBuf> {
    let cwd = std::env::current_dir()?;
    let mut current = cwd.as_path();
    loop {
        if current.join(".git").exists() {
            return Ok(current.to_path_buf());
        }
        match current.parent() {
            Some(parent) => current = parent,
            None => anyhow::bail!("not inside a git repository; run deck from a repository"),
        }
    }
}
