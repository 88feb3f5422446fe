//! Output formatting for the task assignment and search results.
//!
//! Supports human-readable terminal output and JSON for scripting.

use archlab_core::model::{Task, TaskAssignment};
use archlab_core::search::SearchResult;

/// Maximum characters of an issue summary shown per result line.
const SUMMARY_MAX_LEN: usize = 120;

/// Formats the task assignment as pretty-printed JSON.
pub fn format_tasks_json(assignment: &TaskAssignment) -> String {
    serde_json::to_string_pretty(assignment).unwrap_or_else(|_| "[]".to_string())
}

/// Formats the task assignment for the terminal.
pub fn format_tasks_human(participant: &str, assignment: &TaskAssignment) -> String {
    if assignment.is_empty() {
        return format!("No tasks assigned to {}", participant);
    }

    let mut output = String::new();
    output.push_str(&format!("Tasks for {}:\n", participant));

    for task in assignment.tasks() {
        output.push('\n');
        output.push_str(&format!("Task: {}\n", task.name));
        if !task.description.is_empty() {
            output.push_str(&format!("  {}\n", task.description.replace('\n', "\n  ")));
        }
        let mut modes = Vec::new();
        if task.gpt {
            modes.push("query rewriting");
        }
        if task.rerank_engine {
            modes.push("reranked retrieval");
        }
        if !modes.is_empty() {
            output.push_str(&format!("  [{}]\n", modes.join(", ")));
        }

        for (key, question) in &task.questions {
            let solved = if task.is_solved(key) {
                " (solved)".to_string()
            } else {
                format!(" (solved: {}/2)", task.solved_count(key))
            };
            output.push_str(&format!(
                "  {} - {} question{}\n    {}\n",
                key,
                question.question_type,
                solved,
                question.description.replace('\n', "\n    ")
            ));
        }
    }

    output.trim_end().to_string()
}

/// Formats one search result set for the terminal.
pub fn format_results_human(results: &[SearchResult]) -> String {
    if results.is_empty() {
        return "No results found.".to_string();
    }

    let mut output = String::new();
    for (position, result) in results.iter().enumerate() {
        output.push_str(&format!(
            "{}. {} (score: {:.2})\n",
            position + 1,
            result.key,
            result.score
        ));
        if !result.summary.is_empty() {
            output.push_str(&format!("   {}\n", truncate_text(&result.summary, SUMMARY_MAX_LEN)));
        }
        let labels: Vec<&str> = [&result.existence, &result.executive, &result.property]
            .into_iter()
            .flatten()
            .map(String::as_str)
            .collect();
        if !labels.is_empty() {
            output.push_str(&format!("   labels: {}\n", labels.join(", ")));
        }
    }
    output.trim_end().to_string()
}

/// One-line rendering of a task's rating scale, ascending.
pub fn format_scale(task: &Task) -> String {
    task.scale
        .entries()
        .map(|(score, label)| format!("{} = {}", score, label))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Truncates text to a maximum length, adding ellipsis if needed.
fn truncate_text(text: &str, max_len: usize) -> String {
    let text = text.trim();
    if text.chars().count() <= max_len {
        text.to_string()
    } else {
        let truncated: String = text.chars().take(max_len).collect();
        match truncated.rfind(' ') {
            Some(last_space) => format!("{}...", &truncated[..last_space]),
            None => format!("{}...", truncated),
        }
    }
}
