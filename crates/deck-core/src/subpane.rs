//! Secondary terminal panes attached to an instance's window.
//!
//! Split geometry is deterministic by ordinal: the first sub-pane takes a
//! 30% band below the primary, later ones halve the lower band side by
//! side. A hard cap keeps the window usable.

use chrono::Utc;
use tracing::warn;

use deck_mux::SplitDirection;
use deck_state::SubPane;

use crate::error::{Error, Result};
use crate::manager::Manager;

/// Most sub-panes one window will accept.
pub const MAX_SUB_PANES: usize = 6;

impl Manager {
    /// Split a new sub-pane into the instance's window. Returns the new
    /// pane id.
    pub fn create_sub_pane(&self, id: &str, label: &str) -> Result<String> {
        let instance = self.get_instance(id)?;

        let ordinal = instance.sub_panes.len();
        if ordinal >= MAX_SUB_PANES {
            return Err(Error::PreconditionFailed(format!(
                "sub-pane cap reached ({ordinal}/{MAX_SUB_PANES})"
            )));
        }

        // First split carves the bottom band off the primary pane; later
        // splits divide that band.
        let (direction, percent) = if ordinal == 0 {
            (SplitDirection::Vertical, 30)
        } else {
            (SplitDirection::Horizontal, 50)
        };

        let pane_id = self.mux().split_window(
            &instance.window_id,
            &instance.worktree_path,
            direction,
            percent,
        )?;

        let init = &self.config().workspace.sub_pane_init_command;
        if !init.is_empty() {
            if let Err(e) = self.mux().send_keys(&pane_id, init) {
                warn!(target: "deck::core", pane = %pane_id, error = %e, "sub-pane init command failed");
            }
        }

        let label = label.to_string();
        let recorded = pane_id.clone();
        if let Err(e) = self.store().update_instance(id, move |inst| {
            inst.sub_panes.push(SubPane {
                pane_id: recorded,
                label,
                created_at: Utc::now(),
            });
        }) {
            let _ = self.mux().kill_pane(&pane_id);
            return Err(e.into());
        }

        Ok(pane_id)
    }

    pub fn list_sub_panes(&self, id: &str) -> Result<Vec<SubPane>> {
        Ok(self.get_instance(id)?.sub_panes)
    }

    /// Kill one sub-pane and drop it from the record.
    pub fn kill_sub_pane(&self, id: &str, pane_id: &str) -> Result<()> {
        self.mux().kill_pane(&pane_id.to_string())?;
        let pane_id = pane_id.to_string();
        self.store().update_instance(id, move |inst| {
            inst.sub_panes.retain(|p| p.pane_id != pane_id);
        })?;
        Ok(())
    }

    /// Kill every sub-pane, continuing past individual failures.
    pub fn kill_all_sub_panes(&self, id: &str) -> Result<()> {
        let instance = self.get_instance(id)?;
        for sub in &instance.sub_panes {
            if let Err(e) = self.mux().kill_pane(&sub.pane_id) {
                warn!(target: "deck::core", pane = %sub.pane_id, error = %e, "failed to kill sub-pane");
            }
        }
        self.store()
            .update_instance(id, |inst| inst.sub_panes.clear())?;
        Ok(())
    }
}
