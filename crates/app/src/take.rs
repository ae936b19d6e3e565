//! Interactive terminal session for one exam attempt.

use services::sessions::{ActiveExam, ExamTick, SessionNotice, SessionStatus};
use services::{AppServices, SessionError};
use studify_core::model::{FinishReason, TemplateId};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::render;

/// Remaining time is announced on multiples of this many seconds.
const ANNOUNCE_EVERY_SECS: u32 = 10;

enum Flow {
    Continue,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Input {
    Empty,
    Help,
    Start,
    Answer(usize),
    Clear,
    Next,
    Previous,
    GoTo(usize),
    Flag,
    Status,
    Submit,
    Review,
    Retry,
    Restart,
    Quit,
    Invalid(String),
}

/// Parse one line of user input. Question and option numbers are 1-based.
fn parse_input(line: &str) -> Input {
    let mut parts = line.split_whitespace();
    let Some(head) = parts.next() else {
        return Input::Empty;
    };
    let number = |raw: Option<&str>| {
        raw.and_then(|v| v.parse::<usize>().ok())
            .and_then(|n| n.checked_sub(1))
    };

    match head {
        "help" | "?" => Input::Help,
        "start" => Input::Start,
        "a" => number(parts.next()).map_or_else(
            || Input::Invalid("usage: a <option number>".into()),
            Input::Answer,
        ),
        "c" => Input::Clear,
        "n" => Input::Next,
        "p" => Input::Previous,
        "g" => number(parts.next()).map_or_else(
            || Input::Invalid("usage: g <question number>".into()),
            Input::GoTo,
        ),
        "f" => Input::Flag,
        "s" => Input::Status,
        "submit" => Input::Submit,
        "r" | "review" => Input::Review,
        "retry" => Input::Retry,
        "restart" => Input::Restart,
        "q" | "quit" => Input::Quit,
        other => Input::Invalid(format!("unknown command: {other} (type `help`)")),
    }
}

fn print_help() {
    println!("Commands:");
    println!("  start           begin the timed attempt");
    println!("  a <n>           answer the current question with option n");
    println!("  c               clear the current answer");
    println!("  n / p           next / previous question");
    println!("  g <n>           go to question n");
    println!("  f               flag or unflag the current question");
    println!("  s               show status");
    println!("  submit          finish now");
    println!("  review          show answers after finishing");
    println!("  retry           retry saving a result that failed to save");
    println!("  restart         start a new attempt after finishing");
    println!("  quit            leave");
}

/// Run one exam attempt until the user quits or input ends.
///
/// # Errors
///
/// Returns an error on terminal I/O failures or unexpected storage errors
/// while opening the exam.
pub(crate) async fn run_exam(
    app: &AppServices,
    template_id: TemplateId,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut exam = match app.exam_loop().open(template_id).await {
        Ok(exam) => exam,
        Err(SessionError::Unavailable) => {
            println!("Template {template_id} is unavailable: it does not exist or has no questions.");
            return Ok(());
        }
        Err(err) => return Err(err.into()),
    };

    println!(
        "{}: {} questions, {} time limit. Type `start` to begin or `help` for commands.",
        exam.title(),
        exam.session().question_count(),
        render::format_clock(exam.session().time_limit_secs())
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if let Flow::Quit = handle_input(&mut exam, parse_input(&line)).await {
                    break;
                }
            }
            Some(tick) = exam.next_tick() => {
                match exam.on_tick(tick).await {
                    Ok(ExamTick::Running { remaining_secs })
                        if remaining_secs % ANNOUNCE_EVERY_SECS == 0 =>
                    {
                        println!("{} remaining", render::format_clock(remaining_secs));
                    }
                    Ok(ExamTick::Expired(outcome)) => {
                        println!();
                        println!("Time is up.");
                        render::print_outcome(&outcome, exam.session().passing_score());
                    }
                    Ok(_) => {}
                    Err(err) => println!("{err}"),
                }
            }
        }
        report_notices(&mut exam);
    }

    exam.settle().await;
    report_notices(&mut exam);
    if exam.session().status() == SessionStatus::InProgress {
        println!("Attempt abandoned; nothing was scored.");
    }
    Ok(())
}

fn report_notices(exam: &mut ActiveExam) {
    for notice in exam.notices() {
        match notice {
            SessionNotice::SyncFailed {
                question_index,
                error,
            } => {
                println!(
                    "Note: question {} could not be saved remotely ({error}); your answer is kept.",
                    question_index + 1
                );
            }
        }
    }
}

async fn handle_input(exam: &mut ActiveExam, input: Input) -> Flow {
    let outcome = match input {
        Input::Empty => Ok(()),
        Input::Help => {
            print_help();
            Ok(())
        }
        Input::Invalid(message) => {
            println!("{message}");
            Ok(())
        }
        Input::Quit => return Flow::Quit,
        Input::Start => exam.start().map(|()| render::print_question(exam.session())),
        Input::Answer(option) => exam
            .answer_current(option)
            .map(|()| render::print_question(exam.session())),
        Input::Clear => {
            let index = exam.session().current_index();
            exam.clear_answer(index)
                .map(|()| render::print_question(exam.session()))
        }
        Input::Next => exam.next().map(|()| render::print_question(exam.session())),
        Input::Previous => exam
            .previous()
            .map(|()| render::print_question(exam.session())),
        Input::GoTo(index) => exam
            .go_to(index)
            .map(|()| render::print_question(exam.session())),
        Input::Flag => {
            let index = exam.session().current_index();
            exam.toggle_flag(index)
                .map(|()| render::print_question(exam.session()))
        }
        Input::Status => {
            let session = exam.session();
            render::print_status(&session.progress(), &session.ledger().flagged_indices());
            Ok(())
        }
        Input::Submit => match exam.finish(FinishReason::Submitted).await {
            Ok(outcome) => {
                render::print_outcome(&outcome, exam.session().passing_score());
                Ok(())
            }
            Err(err) => Err(err),
        },
        Input::Review => match exam.session().status() {
            SessionStatus::Completed => {
                render::print_review(exam.session());
                Ok(())
            }
            _ => Err(SessionError::NotCompleted),
        },
        Input::Retry => exam
            .retry_persist()
            .await
            .map(|id| println!("Saved as result {id}.")),
        Input::Restart => exam.restart().map(|()| {
            println!("New attempt ready. Type `start` to begin.");
        }),
    };

    if let Err(err) = outcome {
        println!("{err}");
    }
    Flow::Continue
}
