//! Line-oriented quiz screen. Reads commands from any `AsyncBufRead` and
//! renders to any `Write`, so the whole loop runs headless in tests.

use std::io::Write;

use anyhow::{anyhow, bail, Result};
use client_core::{Phase, QuizController, QuizError, SessionState, Summary};
use shared::domain::{DailyProgress, Verdict};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

pub async fn run_quiz(
    controller: &QuizController,
    input: &mut (impl AsyncBufRead + Unpin),
    out: &mut impl Write,
) -> Result<Option<Summary>> {
    loop {
        let state = controller.state().await;
        match state.phase() {
            Phase::Idle | Phase::Failed => {
                writeln!(out, "Loading questions...")?;
                if let Err(err) = controller.start().await {
                    writeln!(out, "Could not load questions: {err}")?;
                    write!(out, "Retry? [y/N] ")?;
                    out.flush()?;
                    match read_line(input).await? {
                        Some(answer) if answer.eq_ignore_ascii_case("y") => continue,
                        _ => return Ok(None),
                    }
                }
            }
            Phase::Presenting => {
                render_question(out, &state)?;
                let Some(line) = read_line(input).await? else {
                    return Ok(None);
                };
                if line.eq_ignore_ascii_case("q") {
                    return Ok(None);
                }
                if line.is_empty() {
                    match controller.submit().await {
                        Ok(_) => {}
                        Err(QuizError::Validation(err)) => writeln!(out, "{err}")?,
                        Err(QuizError::Transport(err)) => writeln!(
                            out,
                            "Could not submit answer: {err}. Your selection is kept, press Enter to retry."
                        )?,
                        Err(err) => return Err(err.into()),
                    }
                    continue;
                }
                match choice_for(&state, &line) {
                    Some(choice) => {
                        if let Err(err) = controller.select_choice(&choice).await {
                            writeln!(out, "{err}")?;
                        }
                    }
                    None => writeln!(
                        out,
                        "Type a number between 1 and {}, Enter to submit, q to quit.",
                        state.current_question().map_or(0, |q| q.choices.len())
                    )?,
                }
            }
            Phase::Reviewing => {
                if let Some(verdict) = state.pending_verdict() {
                    render_verdict(out, verdict)?;
                }
                write!(out, "Press Enter to continue ")?;
                out.flush()?;
                match read_line(input).await? {
                    Some(line) if !line.eq_ignore_ascii_case("q") => {
                        controller.advance().await?;
                    }
                    _ => return Ok(None),
                }
            }
            Phase::Completed => {
                let summary = controller
                    .summary()
                    .await
                    .ok_or_else(|| anyhow!("completed session has no summary"))?;
                render_summary(out, &summary)?;
                return Ok(Some(summary));
            }
            // Every call above runs to completion, so these only show up when
            // another task is driving the same controller.
            phase @ (Phase::Loading | Phase::Submitting | Phase::Finishing) => {
                bail!("quiz session is {phase} in another task");
            }
        }
    }
}

async fn read_line(input: &mut (impl AsyncBufRead + Unpin)) -> Result<Option<String>> {
    let mut line = String::new();
    if input.read_line(&mut line).await? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

/// Exact choice text wins over a 1-based number.
fn choice_for(state: &SessionState, line: &str) -> Option<String> {
    let question = state.current_question()?;
    if let Some(choice) = question.choices.iter().find(|c| c.as_str() == line) {
        return Some(choice.clone());
    }
    line.parse::<usize>()
        .ok()?
        .checked_sub(1)
        .and_then(|i| question.choices.get(i))
        .cloned()
}

fn render_question(out: &mut impl Write, state: &SessionState) -> Result<()> {
    let Some(question) = state.current_question() else {
        return Ok(());
    };
    writeln!(out)?;
    writeln!(out, "Question {} of {}", state.position(), state.total())?;
    writeln!(out, "{}", question.prompt)?;
    for (i, choice) in question.choices.iter().enumerate() {
        let mark = if state.selected_choice() == Some(choice.as_str()) {
            "x"
        } else {
            " "
        };
        writeln!(out, "  [{mark}] {}. {choice}", i + 1)?;
    }
    write!(out, "Number to select, Enter to submit, q to quit: ")?;
    out.flush()?;
    Ok(())
}

fn render_verdict(out: &mut impl Write, verdict: &Verdict) -> Result<()> {
    if !verdict.feedback_message.is_empty() {
        writeln!(out, "{}", verdict.feedback_message)?;
    } else if verdict.is_correct {
        writeln!(out, "Correct!")?;
    } else {
        writeln!(out, "Wrong. Correct answer: {}", verdict.correct_choice)?;
    }
    writeln!(out, "Total score: {}", verdict.authoritative_total_score)?;
    Ok(())
}

pub fn render_summary(out: &mut impl Write, summary: &Summary) -> Result<()> {
    writeln!(out)?;
    writeln!(out, "Quiz complete!")?;
    writeln!(
        out,
        "Correct: {}/{}",
        summary.correct_count, summary.total_questions
    )?;
    writeln!(out, "Session points: +{}", summary.session_points_earned)?;
    match summary.authoritative_total_score {
        Some(total) => writeln!(out, "Total score: {total}")?,
        None => writeln!(out, "Total score: unavailable")?,
    }
    if !summary.missed_items.is_empty() {
        writeln!(out, "Missed:")?;
        for item in &summary.missed_items {
            writeln!(
                out,
                "  {}: you chose {}, correct answer {}",
                item.prompt, item.chosen_choice, item.correct_choice
            )?;
        }
    }
    Ok(())
}

pub fn render_progress(out: &mut impl Write, progress: &DailyProgress) -> Result<()> {
    let status = if progress.is_met() {
        "goal reached"
    } else {
        "keep going"
    };
    writeln!(
        out,
        "Daily goal: {}/{} ({status})",
        progress.completed, progress.target
    )?;
    Ok(())
}

#[cfg(test)]
#[path = "tests/terminal_tests.rs"]
mod tests;
