//! Terminal formatting. Rounding happens here and nowhere else.

use services::sessions::{ExamSession, SessionProgress};
use services::{FinishOutcome, ResultListItem};
use storage::repository::TemplateListItem;
use studify_core::model::{CompletedResult, FinishReason, TemplateId};

pub(crate) fn format_clock(secs: u32) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

fn format_duration(secs: u32) -> String {
    match (secs / 3600, (secs % 3600) / 60, secs % 60) {
        (0, 0, s) => format!("{s}s"),
        (0, m, s) => format!("{m}m {s:02}s"),
        (h, m, s) => format!("{h}h {m:02}m {s:02}s"),
    }
}

fn reason_label(reason: FinishReason) -> &'static str {
    match reason {
        FinishReason::Submitted => "submitted",
        FinishReason::TimeExpired => "time expired",
    }
}

pub(crate) fn print_templates(items: &[TemplateListItem]) {
    if items.is_empty() {
        println!("No templates yet. Import one with `app import --file <path>`.");
        return;
    }
    for item in items {
        println!(
            "{:>4}  {}  ({} questions, {})",
            item.id,
            item.title,
            item.question_count,
            format_duration(item.time_limit_secs)
        );
    }
}

pub(crate) fn print_results(template_id: TemplateId, items: &[ResultListItem]) {
    if items.is_empty() {
        println!("No results for template {template_id}.");
        return;
    }
    for item in items {
        println!(
            "{:>4}  {}  {:>5.1}%  {}  {}/{} correct, {} unanswered, {}  [{}]",
            item.id,
            item.completed_at.format("%Y-%m-%d %H:%M"),
            item.score_percent,
            if item.passed { "PASS" } else { "FAIL" },
            item.correct,
            item.total,
            item.unanswered,
            format_duration(item.time_spent_secs),
            reason_label(item.reason),
        );
    }
}

pub(crate) fn print_question(session: &ExamSession) {
    let Some(question) = session.current_question() else {
        return;
    };
    let index = session.current_index();
    let record = session.ledger().get(index).copied().unwrap_or_default();

    println!();
    println!(
        "Question {}/{}  [{}]{}",
        index + 1,
        session.question_count(),
        question.subject(),
        if record.flagged { "  (flagged)" } else { "" }
    );
    println!("{}", question.prompt());
    for (i, option) in question.options().iter().enumerate() {
        let marker = if record.selected == Some(i) { '*' } else { ' ' };
        println!("  {marker} {}) {option}", i + 1);
    }
}

pub(crate) fn print_status(progress: &SessionProgress, flagged: &[usize]) {
    println!(
        "{}: question {}/{}, {} answered, {} unanswered, {} remaining",
        progress.status,
        progress.current + 1,
        progress.total,
        progress.answered,
        progress.unanswered(),
        format_clock(progress.remaining_secs)
    );
    if !flagged.is_empty() {
        let list: Vec<String> = flagged.iter().map(|i| (i + 1).to_string()).collect();
        println!("Flagged: {}", list.join(", "));
    }
}

pub(crate) fn print_result(result: &CompletedResult, passing_score: u8) {
    println!();
    println!(
        "Score: {:.1}% ({} of {} correct, {} incorrect, {} unanswered), passing score {}%: {}",
        result.score_percent(),
        result.correct(),
        result.total_questions(),
        result.incorrect(),
        result.unanswered(),
        passing_score,
        if result.passed() { "PASSED" } else { "FAILED" }
    );
    println!(
        "Finished: {}, time spent {}",
        reason_label(result.reason()),
        format_duration(result.time_spent_secs())
    );
    if !result.subjects().is_empty() {
        println!("By subject:");
        for subject in result.subjects() {
            println!("  {}: {}/{}", subject.subject, subject.correct, subject.total);
        }
    }
}

pub(crate) fn print_outcome(outcome: &FinishOutcome, passing_score: u8) {
    print_result(&outcome.result, passing_score);
    match (&outcome.persist_error, outcome.result_id) {
        (Some(err), _) => {
            println!("Result could not be saved: {err}. Type `retry` to try again.");
        }
        (None, Some(id)) => println!("Saved as result {id}."),
        (None, None) => {}
    }
}

pub(crate) fn print_review(session: &ExamSession) {
    for (index, question) in session.questions().iter().enumerate() {
        let selected = session.ledger().get(index).and_then(|r| r.selected);
        let verdict = match selected {
            None => "unanswered",
            Some(option) if question.is_correct(option) => "correct",
            Some(_) => "incorrect",
        };
        println!();
        println!("{}. {} ({verdict})", index + 1, question.prompt());
        if let Some(answer) = selected.and_then(|option| question.options().get(option)) {
            println!("   your answer: {answer}");
        }
        if let Some(answer) = question.options().get(question.correct_option()) {
            println!("   correct answer: {answer}");
        }
        if let Some(explanation) = question.explanation() {
            println!("   {explanation}");
        }
    }
}
