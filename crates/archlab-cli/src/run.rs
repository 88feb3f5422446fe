//! Command implementations: task listing and the interactive question session.
//!
//! The interactive session walks the participant through one question:
//! pick a task and question, search the issue corpus, rate every returned
//! result on the task's scale, submit. Searching again at any point discards
//! the collected ratings, and submission is only offered once every result
//! has one.

use anyhow::{anyhow, Context, Result};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use archlab_core::error::SessionError;
use archlab_core::model::{ParticipantId, Task, TaskAssignment};
use archlab_core::session::ExperimentSession;
use tracing::warn;

use crate::{config, output};

/// `archlab tasks`: fetch, cache, and print the assignment.
pub async fn fetch_and_show_tasks(
    participant: &str,
    json: bool,
    data_dir: Option<&PathBuf>,
) -> Result<()> {
    let mut session = config::open_session(data_dir).await?;
    if let Err(e) = session.restore().await {
        warn!("could not restore cached session: {}", e);
    }

    let outcome = session
        .fetch_tasks(&ParticipantId::new(participant))
        .await
        .context("Failed to fetch tasks")?;
    if outcome.is_updated() {
        // Acknowledged once, and only when the assignment actually changed.
        eprintln!("Tasks fetched successfully.");
    }

    let text = if json {
        output::format_tasks_json(outcome.assignment())
    } else {
        output::format_tasks_human(participant, outcome.assignment())
    };
    println!("{}", text);
    Ok(())
}

/// `archlab run`: interactive search/rate/submit session for one question.
pub async fn run_question_session(
    participant: &str,
    task_arg: Option<String>,
    question_arg: Option<String>,
    data_dir: Option<&PathBuf>,
) -> Result<()> {
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    let mut session = config::open_session(data_dir).await?;
    if let Err(e) = session.restore().await {
        warn!("could not restore cached session: {}", e);
    }

    let outcome = session
        .fetch_tasks(&ParticipantId::new(participant))
        .await
        .context("Failed to fetch tasks")?;
    if outcome.is_updated() {
        println!("Tasks fetched successfully.");
    }
    let assignment = outcome.assignment().clone();
    if assignment.is_empty() {
        return Err(anyhow!("No tasks assigned to {}", participant));
    }

    let task_name = match task_arg {
        Some(name) => name,
        None => choose_task(&mut lines, &assignment)?,
    };
    let task = session.select_task(&task_name).await?.clone();

    let question_key = match question_arg {
        Some(key) => key,
        None => choose_question(&mut lines, &task)?,
    };
    session.open_question(&task_name, &question_key)?;
    let question = task
        .question(&question_key)
        .ok_or_else(|| anyhow!("Unknown question {} in task {}", question_key, task_name))?;

    println!();
    println!("{} question: {}", question.question_type, question.description);
    println!("Scale: {}", output::format_scale(&task));
    println!("Type a search query, or \"quit\" to leave.");

    loop {
        let Some(query) = prompt(&mut lines, "query> ")? else {
            break;
        };
        if query.eq_ignore_ascii_case("quit") {
            break;
        }

        let results = match session.search(&query).await {
            Ok(outcome) => {
                println!("{}", output::format_results_human(&outcome.results));
                if outcome.is_empty() {
                    continue;
                }
                outcome.results
            }
            Err(e) => {
                if let Some(message) = search_error_message(&e) {
                    println!("{}", message);
                }
                continue;
            }
        };

        let positions: Vec<(i64, String)> =
            results.iter().map(|r| (r.id, r.key.clone())).collect();
        if !collect_ratings(&mut lines, &mut session, &task, &positions)? {
            println!("Ratings discarded; search again.");
            continue;
        }

        match session.submit().await {
            Ok(()) => {
                println!("Ratings submitted. Thank you!");
                break;
            }
            Err(e) => println!("{}", submit_error_message(&e)),
        }
    }

    Ok(())
}

/// Prompts for one rating per result, in display order.
///
/// Returns `false` when the participant bails out (`skip` or end of input);
/// the collected ratings then die with the next search.
fn collect_ratings(
    lines: &mut impl Iterator<Item = io::Result<String>>,
    session: &mut ExperimentSession,
    task: &Task,
    positions: &[(i64, String)],
) -> Result<bool> {
    println!("Rate each result ({}), or \"skip\" to search again.", output::format_scale(task));
    for (position, (issue_id, key)) in positions.iter().enumerate() {
        loop {
            let label = format!("rate {} ({})> ", position + 1, key);
            let Some(input) = prompt(lines, &label)? else {
                return Ok(false);
            };
            if input.eq_ignore_ascii_case("skip") {
                return Ok(false);
            }
            let Ok(score) = input.parse::<u8>() else {
                println!("Enter one of the scale scores.");
                continue;
            };
            if !task.scale.contains(score) {
                println!("Enter one of the scale scores.");
                continue;
            }
            session.rate(position, *issue_id, score.to_string())?;
            break;
        }
    }
    Ok(true)
}

fn choose_task(
    lines: &mut impl Iterator<Item = io::Result<String>>,
    assignment: &TaskAssignment,
) -> Result<String> {
    println!("Available tasks:");
    for (index, task) in assignment.tasks().iter().enumerate() {
        println!("  {}. {}", index + 1, task.name);
    }
    loop {
        let Some(input) = prompt(lines, "task> ")? else {
            return Err(anyhow!("No task selected"));
        };
        if let Some(task) = input
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|i| assignment.tasks().get(i))
        {
            return Ok(task.name.clone());
        }
        if assignment.task(&input).is_some() {
            return Ok(input);
        }
        println!("Unknown task.");
    }
}

fn choose_question(
    lines: &mut impl Iterator<Item = io::Result<String>>,
    task: &Task,
) -> Result<String> {
    println!("Questions in {}:", task.name);
    for (key, question) in &task.questions {
        let solved = if task.is_solved(key) { " [solved]" } else { "" };
        println!("  {}{} - {}", key, solved, question.description);
    }
    loop {
        let Some(input) = prompt(lines, "question> ")? else {
            return Err(anyhow!("No question selected"));
        };
        if task.question(&input).is_some() {
            return Ok(input);
        }
        println!("Unknown question.");
    }
}

/// Reads one trimmed line after printing `label`; `None` on end of input.
fn prompt(
    lines: &mut impl Iterator<Item = io::Result<String>>,
    label: &str,
) -> Result<Option<String>> {
    print!("{}", label);
    io::stdout().flush()?;
    match lines.next() {
        Some(line) => Ok(Some(line?.trim().to_string())),
        None => Ok(None),
    }
}

/// Participant-facing message for a failed search, if one should be shown.
///
/// Superseded pipeline runs are silent.
fn search_error_message(error: &SessionError) -> Option<String> {
    match error {
        SessionError::Search(search) => search.user_message().map(str::to_string),
        other => Some(other.to_string()),
    }
}

fn submit_error_message(error: &SessionError) -> String {
    match error {
        SessionError::Submit(submit) => submit.user_message().to_string(),
        other => other.to_string(),
    }
}
