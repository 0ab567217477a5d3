//! Plain-text rendering of views and outcomes.
//!
//! Every function returns a `String`; printing happens in `main`.

use shiftlog_core::{
    ActivityKind, DeleteOutcome, DeletePlan, EditForm, EditOutcome, SplitOutcome, SplitProposal,
    StartOutcome, StopOutcome, SyncReport, TimelineView, UndoOutcome, ViewItem,
};
use std::fmt::Write as _;

pub fn view(view: &TimelineView, undo_available: bool) -> String {
    let mut out = String::new();
    match &view.active {
        Some(active) => {
            let rest = if active.rest_satisfied { "  [rest ok]" } else { "" };
            let _ = writeln!(
                out,
                "> {} since {}  {}{}",
                active.label, active.started_label, active.elapsed_label, rest
            );
        }
        None => {
            let _ = writeln!(out, "> idle  00:00:00");
        }
    }
    if undo_available {
        let _ = writeln!(out, "  (undo available: `shiftlog undo`)");
    }
    if view.items.is_empty() {
        let _ = writeln!(out, "\nno blocks recorded");
        return out;
    }

    out.push('\n');
    for item in &view.items {
        match item {
            ViewItem::Block(row) => {
                let flag = if row.negative { " !" } else { "" };
                let _ = writeln!(
                    out,
                    "{:<14} {:<11} {} - {:<11} {:>9}{}",
                    row.id, row.label, row.start_label, row.end_label, row.duration_label, flag
                );
            }
            ViewItem::ShiftDivider { date_label } => {
                let _ = writeln!(out, "---------- shift change ({date_label}) ----------");
            }
        }
    }
    out
}

pub fn kinds() -> String {
    let mut out = String::new();
    for kind in ActivityKind::BUILTIN {
        let _ = writeln!(out, "{:<12} {}", kind.as_label(), kind.display_label());
    }
    out
}

pub fn start(outcome: &StartOutcome, kind: &ActivityKind) -> String {
    match outcome {
        StartOutcome::Started { id, stopped: Some(prev) } => {
            format!("started {} ({id}); closed {prev}", kind.display_label())
        }
        StartOutcome::Started { id, stopped: None } => {
            format!("started {} ({id})", kind.display_label())
        }
        StartOutcome::AlreadyActive(id) => {
            format!("{} is already running ({id})", kind.display_label())
        }
    }
}

pub fn stop(outcome: &StopOutcome) -> String {
    match outcome {
        StopOutcome::Stopped(id) => format!("stopped {id}"),
        StopOutcome::NoOpenBlock => "nothing is running".to_string(),
    }
}

pub fn edit_form(form: &EditForm) -> String {
    format!(
        "{} {} start={} end={}{}",
        form.id,
        form.kind.as_label(),
        form.start,
        form.end.as_deref().unwrap_or("-"),
        if form.running { " (running)" } else { "" }
    )
}

pub fn edit(outcome: &EditOutcome) -> String {
    match outcome {
        EditOutcome::Applied {
            id,
            rippled_prev,
            rippled_next,
        } => {
            let mut line = format!("updated {id}");
            if let Some(prev) = rippled_prev {
                let _ = write!(line, "; adjusted end of {prev}");
            }
            if let Some(next) = rippled_next {
                let _ = write!(line, "; adjusted start of {next}");
            }
            line
        }
        EditOutcome::NotFound => "block not found".to_string(),
    }
}

pub fn delete_plan(plan: &DeletePlan) -> String {
    match plan {
        DeletePlan::NotFound => "block not found".to_string(),
        DeletePlan::AutoResume { id } => format!("block {id} will be discarded"),
        DeletePlan::ConfirmResume {
            id,
            elapsed,
            has_previous,
        } => {
            let mut line = format!(
                "block {id} has been running for {} min; choose --strategy",
                elapsed.num_minutes()
            );
            if *has_previous {
                line.push_str(" undo-current (resume previous block) or");
            }
            line.push_str(" none (leave a gap)");
            line
        }
        DeletePlan::Repair { id, options } => {
            let mut offered = Vec::new();
            if options.merge {
                offered.push("merge");
            }
            if options.stretch_prev {
                offered.push("stretch-prev");
            }
            if options.pull_next {
                offered.push("pull-next");
            }
            offered.push("none");
            format!("delete {id}: choose --strategy {}", offered.join("|"))
        }
    }
}

pub fn delete(outcome: &DeleteOutcome) -> String {
    match outcome {
        DeleteOutcome::Applied {
            strategy, removed, ..
        } => {
            let ids: Vec<String> = removed.iter().map(ToString::to_string).collect();
            format!("deleted {} ({})", ids.join(", "), strategy.as_str())
        }
        DeleteOutcome::NotFound => "block not found".to_string(),
    }
}

pub fn split_proposal(proposal: &SplitProposal) -> String {
    format!("split {} at {}", proposal.id, proposal.at_label)
}

pub fn split(outcome: &SplitOutcome) -> String {
    match outcome {
        SplitOutcome::Applied { original, created } => {
            format!("split {original}; new block {created}")
        }
        SplitOutcome::NotFound => "block not found".to_string(),
    }
}

pub fn undo(outcome: &UndoOutcome) -> String {
    match outcome {
        UndoOutcome::Restored { .. } => "restored previous timeline".to_string(),
        UndoOutcome::NothingToUndo => "nothing to undo".to_string(),
    }
}

pub fn sync(report: &SyncReport) -> String {
    let mut counts = Vec::new();
    if let Some(processed) = report.processed {
        counts.push(format!("{processed} records processed"));
    }
    if let Some(created) = report.new_versions_created {
        counts.push(format!("{created} new versions"));
    }
    if counts.is_empty() {
        "uploaded".to_string()
    } else {
        format!("uploaded: {}", counts.join(", "))
    }
}
