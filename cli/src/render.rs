use std::time::Duration;

use chainkit_core::api::{first_error, Skipped, TaskStatus, TaskStream, TaskUpdate};
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};

/// Indented status tree of a finished (or live) task list.
///
/// With `collapse_subtasks`, the subtasks of a task that finished without
/// errors and asks to be collapsed are hidden.
pub fn render_tree(tasks: &[TaskStatus], collapse_subtasks: bool) -> String {
    let mut out = String::new();
    render_into(&mut out, tasks, 0, collapse_subtasks);
    out
}

fn render_into(out: &mut String, tasks: &[TaskStatus], depth: usize, collapse_subtasks: bool) {
    let indent = "  ".repeat(depth);
    for task in tasks {
        out.push_str(&format!("{indent}{} {}", icon(task), task.title));
        match &task.skipped {
            Some(Skipped::Reason(reason)) => out.push_str(&format!(" [skipped: {reason}]")),
            Some(Skipped::Flag(true)) => out.push_str(" [skipped]"),
            _ => {}
        }
        out.push('\n');

        if let Some(error) = &task.error {
            out.push_str(&format!("{indent}  → {error}\n"));
        } else if task.is_pending() {
            if let Some(message) = &task.message {
                out.push_str(&format!("{indent}  → {message}\n"));
            }
        }

        if let Some(subtasks) = &task.subtasks {
            let hide = collapse_subtasks
                && task.collapse
                && task.is_done()
                && first_error(subtasks).is_none();
            if !hide {
                render_into(out, subtasks, depth + 1, collapse_subtasks);
            }
        }
    }
}

fn icon(task: &TaskStatus) -> &'static str {
    if task.error.is_some() {
        "✖"
    } else if task.is_skipped() {
        "↓"
    } else if task.is_complete() {
        "✔"
    } else if task.is_pending() {
        "›"
    } else {
        "◻"
    }
}

/// "Boot node: Listening on ..." for the innermost running task.
pub fn active_line(tasks: &[TaskStatus]) -> Option<String> {
    let task = tasks.iter().find(|t| t.is_pending())?;
    if let Some(inner) = task.subtasks.as_deref().and_then(active_line) {
        return Some(inner);
    }
    Some(match &task.message {
        Some(message) => format!("{}: {message}", task.title),
        None => task.title.clone(),
    })
}

/// Spinner shown while a task stream is live.
pub struct ProgressView {
    bar: ProgressBar,
}

impl ProgressView {
    pub fn new(title: &str, interval: Duration, enabled: bool) -> Self {
        if !enabled {
            return Self {
                bar: ProgressBar::hidden(),
            };
        }

        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "✔"]);
        bar.set_style(style);
        bar.set_message(title.to_string());
        bar.enable_steady_tick(interval);
        Self { bar }
    }

    /// Drain `stream`, keeping the spinner on the running task. Returns the
    /// last update.
    pub async fn follow(&self, mut stream: TaskStream) -> TaskUpdate {
        let mut last = TaskUpdate::default();
        while let Some(update) = stream.next().await {
            if let Some(line) = active_line(&update.tasks) {
                self.bar.set_message(line);
            }
            last = update;
        }
        self.bar.finish_and_clear();
        last
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn status(title: &str) -> TaskStatus {
        TaskStatus::new(title.to_lowercase(), title, true)
    }

    fn done(title: &str) -> TaskStatus {
        let mut s = status(title);
        s.complete = Some(true);
        s.pending = Some(false);
        s
    }

    #[test]
    fn test_collapses_successful_subtasks() {
        let mut parent = done("Creating network local");
        parent.subtasks = Some(vec![done("Allocate ports"), done("Write genesis")]);
        let mut skipped = status("Fund default wallet");
        skipped.skipped = Some("No wallet selected".into());

        let tasks = vec![parent, skipped];
        assert_eq!(
            render_tree(&tasks, true),
            "✔ Creating network local\n↓ Fund default wallet [skipped: No wallet selected]\n"
        );
        assert_eq!(
            render_tree(&tasks, false),
            "✔ Creating network local\n  ✔ Allocate ports\n  ✔ Write genesis\n\
             ↓ Fund default wallet [skipped: No wallet selected]\n"
        );
    }

    #[test]
    fn test_failed_subtree_stays_expanded() {
        let mut failing = status("Write genesis");
        failing.error = Some("disk full".into());
        let mut parent = done("Creating network local");
        parent.error = Some("disk full".into());
        parent.subtasks = Some(vec![done("Allocate ports"), failing]);

        assert_eq!(
            render_tree(&[parent], true),
            "✖ Creating network local\n  → disk full\n  ✔ Allocate ports\n  ✖ Write genesis\n    → disk full\n"
        );
    }

    #[test]
    fn test_active_line_prefers_innermost_pending_task() {
        let mut boot = status("Boot node");
        boot.pending = Some(true);
        boot.message = Some("Loading genesis".into());
        let mut parent = status("Creating network local");
        parent.pending = Some(true);
        parent.subtasks = Some(vec![done("Allocate ports"), boot]);

        assert_eq!(
            active_line(&[parent]).as_deref(),
            Some("Boot node: Loading genesis")
        );
        assert_eq!(active_line(&[done("x")]), None);
    }
}
