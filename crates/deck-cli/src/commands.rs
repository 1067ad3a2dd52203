//! Command handlers. Each one builds a manager, reconciles when the verb
//! mutates, and prints a plain-text result.

use anyhow::Context;

use deck_core::{CreateOpts, Manager};
use deck_state::StoreRoot;

use crate::Commands;

pub fn run(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Init => init(),
        Commands::Doctor => doctor(),
        other => with_manager(other),
    }
}

fn init() -> anyhow::Result<()> {
    let root = crate::find_repo_root()?;
    deck_config::init(&root)?;

    let store = deck_state::Store::new(&root);
    let doc = store.load()?;
    if doc.repo.is_empty() {
        let doc = StoreRoot {
            repo: root.display().to_string(),
            session: String::new(),
            instances: doc.instances,
        };
        store.save(&doc)?;
    }

    println!("initialised {}", root.join(deck_config::DECK_DIR).display());
    Ok(())
}

fn doctor() -> anyhow::Result<()> {
    let checks = deck_core::check_all();
    for check in &checks {
        let mark = if check.ok() { "ok " } else { "FAIL" };
        let version = check
            .version
            .map(|(a, b, c)| format!(" v{a}.{b}.{c}"))
            .unwrap_or_default();
        match &check.problem {
            Some(problem) => println!("{mark} {}{version}: {problem}", check.name),
            None => println!("{mark} {}{version}", check.name),
        }
    }
    if deck_core::has_critical_problems(&checks) {
        anyhow::bail!("required tools are missing or too old");
    }
    Ok(())
}

fn with_manager(command: Commands) -> anyhow::Result<()> {
    let root = crate::find_repo_root()?;
    let config = deck_config::load(&root)?;
    let mgr = Manager::new(&root, config).context("failed to initialise workspace manager")?;

    // Mutating verbs see a repaired store; read-only verbs take reality
    // as it comes.
    if mutates(&command) {
        let report = mgr.reconcile()?;
        for note in &report.non_fatal {
            eprintln!("warning: {note}");
        }
    }

    match command {
        Commands::New { branch, base, name } => {
            let instance = mgr.create_instance(&CreateOpts {
                name,
                branch,
                base_branch: base,
                init_command: String::new(),
            })?;
            println!("created {} on {}", instance.id, instance.branch);
            println!("  worktree: {}", instance.worktree_path.display());
            println!("  window:   {}", instance.window_id);
        }
        Commands::List => {
            let instances = mgr.list_instances()?;
            if instances.is_empty() {
                println!("no instances");
                return Ok(());
            }
            // Dependencies first; the graph is a DAG by construction.
            let instances =
                deck_core::topological_sort(&instances).unwrap_or(instances);
            for inst in instances {
                let deps = if inst.depends_on.is_empty() {
                    String::new()
                } else {
                    format!("  depends on {}", inst.depends_on.join(", "))
                };
                println!(
                    "{}  {:<8}  {:<20}  {}{}",
                    inst.id, inst.status, inst.name, inst.branch, deps
                );
            }
        }
        Commands::Status { id } => {
            let instance = mgr.resolve_instance(&id)?;
            let probe = mgr.status_probe(&instance.id)?;
            println!("{} ({})", instance.name, instance.id);
            println!("  stored status: {}", probe.instance.status);
            println!("  pid alive:     {}", probe.pid_alive);
            println!("  window:        {}", probe.window_present);
            println!("  pane dead:     {}", probe.pane_dead);
            println!("  running:       {}", probe.is_running);
            let unmerged = mgr.check_dependencies_merged(&instance.id)?;
            if !unmerged.is_empty() {
                println!("  blocked by:    {}", unmerged.join(", "));
            }
        }
        Commands::Delete {
            id,
            force,
            delete_branch,
        } => {
            let instance = mgr.resolve_instance(&id)?;
            mgr.delete_instance(&instance.id, force, delete_branch)?;
            println!("deleted {}", instance.id);
        }
        Commands::Pause { id } => {
            let instance = mgr.resolve_instance(&id)?;
            mgr.pause_instance(&instance.id)?;
            println!("paused {}", instance.id);
        }
        Commands::Resume { id } => {
            let instance = mgr.resolve_instance(&id)?;
            mgr.resume_instance(&instance.id)?;
            println!("resumed {}", instance.id);
        }
        Commands::Focus { id } => {
            let instance = mgr.resolve_instance(&id)?;
            mgr.focus_instance(&instance.id)?;
        }
        Commands::Term { id, kill, label } => {
            let instance = mgr.resolve_instance(&id)?;
            if kill.is_empty() {
                let pane = mgr.create_sub_pane(&instance.id, &label)?;
                println!("created sub-pane {pane}");
            } else {
                mgr.kill_sub_pane(&instance.id, &kill)?;
                println!("killed sub-pane {kill}");
            }
        }
        Commands::Diff { id } => {
            let instance = mgr.resolve_instance(&id)?;
            let stat = mgr.diff_stat(&instance.id)?;
            if stat.summary.is_empty() {
                println!("no changes against {}", instance.base_branch);
            } else {
                println!("{}", stat.summary);
                for file in mgr.diff_files(&instance.id)? {
                    println!("  {} {}", file.status, file.path);
                }
            }
        }
        Commands::Merge {
            id,
            title,
            body,
            check,
        } => {
            let instance = mgr.resolve_instance(&id)?;
            if check {
                let (has_conflicts, files) = mgr.probe_merge(&instance.id)?;
                if has_conflicts {
                    println!("merge of {} would conflict:", instance.branch);
                    for file in files {
                        println!("  {file}");
                    }
                } else {
                    println!("{} merges cleanly into {}", instance.branch, instance.base_branch);
                }
            } else {
                let url = mgr.push_and_publish(&instance.id, &title, &body)?;
                println!("published {url}");
            }
        }
        Commands::Depend { id, on, remove } => {
            let instance = mgr.resolve_instance(&id)?;
            let target = mgr.resolve_instance(&on)?;
            if remove {
                mgr.remove_dependency(&instance.id, &target.id)?;
                println!("removed dependency {} -> {}", instance.id, target.id);
            } else {
                mgr.add_dependency(&instance.id, &target.id)?;
                println!("added dependency {} -> {}", instance.id, target.id);
            }
        }
        Commands::Reconcile => {
            let report = mgr.reconcile()?;
            println!(
                "reconciled: {} removed, {} marked error, {} orphaned worktrees",
                report.instances_removed,
                report.instances_marked_error,
                report.orphaned_worktrees.len()
            );
            for path in &report.orphaned_worktrees {
                println!("  orphan: {}", path.display());
            }
            for note in &report.non_fatal {
                println!("  warning: {note}");
            }
        }
        Commands::Kill => {
            mgr.kill_all()?;
            println!("all instances and the session are gone");
        }
        Commands::Rename { id, name } => {
            let instance = mgr.resolve_instance(&id)?;
            mgr.rename_instance(&instance.id, &name)?;
            println!("renamed {} to {name}", instance.id);
        }
        Commands::Init | Commands::Doctor => unreachable!("handled before manager construction"),
    }

    Ok(())
}

fn mutates(command: &Commands) -> bool {
    matches!(
        command,
        Commands::New { .. }
            | Commands::Delete { .. }
            | Commands::Pause { .. }
            | Commands::Resume { .. }
            | Commands::Term { .. }
            | Commands::Merge { .. }
            | Commands::Depend { .. }
            | Commands::Kill
            | Commands::Rename { .. }
    )
}
