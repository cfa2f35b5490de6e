use std::error::Error;
use std::io::Write;
use std::sync::Arc;

use quiz_core::model::{Choice, ModuleId, Stage};
use services::{QuizLoopService, QuizRunner};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::warn;

/// Run one module interactively until the player declines a retry or input ends.
pub async fn run<R, W>(
    svc: &QuizLoopService,
    module_id: &ModuleId,
    input: &mut R,
    out: &mut W,
) -> Result<(), Box<dyn Error>>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut runner = svc.start_session(module_id).await?;
    let module = Arc::clone(runner.snapshot().await.module());

    writeln!(out, "{}", module.title())?;
    if let Some(subtitle) = module.subtitle() {
        writeln!(out, "{subtitle}")?;
    }

    loop {
        let total = module.total_stages();
        for (index, stage) in module.stages().iter().enumerate() {
            if !answer_stage(&mut runner, index, total, stage, input, out).await? {
                writeln!(out, "bye")?;
                return Ok(());
            }
            if index + 1 < total {
                runner.advance().await?;
            }
        }

        let outcome = runner.finish().await?;
        writeln!(out, "\nCalculating results...")?;
        runner.settle().await;

        writeln!(
            out,
            "{}/{} correct",
            outcome.correct_count, outcome.total_stages
        )?;
        if outcome.passed {
            writeln!(
                out,
                "Passed! +{} coins, +{} xp",
                outcome.reward.coins, outcome.reward.xp
            )?;
        } else {
            writeln!(
                out,
                "Not passed this time. +{} coins, +{} xp",
                outcome.reward.coins, outcome.reward.xp
            )?;
        }
        if let Some(id) = svc.finalize(&mut runner).await? {
            writeln!(out, "Saved completion #{id}")?;
        }

        write!(out, "Try again? [y/N] ")?;
        out.flush()?;
        match read_line(input).await? {
            Some(answer) if answer.eq_ignore_ascii_case("y") => {
                runner.retry().await;
            }
            _ => return Ok(()),
        }
    }
}

/// Prompt until a choice is accepted. Returns `false` when input ends.
async fn answer_stage<R, W>(
    runner: &mut QuizRunner,
    index: usize,
    total: usize,
    stage: &Stage,
    input: &mut R,
    out: &mut W,
) -> Result<bool, Box<dyn Error>>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    writeln!(out, "\n[{}/{}] {}", index + 1, total, stage.prompt())?;
    for (n, choice) in stage.options().iter().enumerate() {
        writeln!(out, "  {}. {}", n + 1, choice.label())?;
    }

    let feedback = loop {
        write!(out, "> ")?;
        out.flush()?;
        let Some(line) = read_line(input).await? else {
            return Ok(false);
        };
        let Some(choice) = resolve_choice(stage, &line) else {
            writeln!(out, "Pick 1-{}", stage.options().len())?;
            continue;
        };
        match runner.select_choice(index, choice.id()).await {
            Ok(feedback) => break feedback,
            Err(err) => {
                warn!(error = %err, "selection rejected");
                writeln!(out, "{err}")?;
            }
        }
    };

    if feedback.is_correct {
        writeln!(out, "Correct! +{}", feedback.points)?;
    } else {
        writeln!(out, "Not quite.")?;
    }
    if !feedback.reflection.is_empty() {
        writeln!(out, "{}", feedback.reflection)?;
    }

    runner.settle().await;
    Ok(true)
}

/// Accept a 1-based option number or a choice id.
fn resolve_choice<'a>(stage: &'a Stage, raw: &str) -> Option<&'a Choice> {
    let raw = raw.trim();
    if let Ok(n) = raw.parse::<usize>() {
        return n.checked_sub(1).and_then(|i| stage.options().get(i));
    }
    stage
        .options()
        .iter()
        .find(|choice| choice.id().as_str() == raw)
}

async fn read_line<R>(input: &mut R) -> std::io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    if input.read_line(&mut line).await? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    use quiz_core::engine::QuizTimings;
    use quiz_core::time::fixed_now;
    use services::Clock;
    use storage::repository::CompletionRepository;
    use storage::{Catalog, Storage};

    fn service(storage: &Storage) -> QuizLoopService {
        QuizLoopService::from_storage(Clock::fixed(fixed_now()), storage)
            .with_timings(QuizTimings::immediate())
    }

    #[tokio::test]
    async fn scripted_passing_run_is_saved() {
        let storage = Storage::in_memory(Catalog::builtin().unwrap());
        let svc = service(&storage);
        let module_id = ModuleId::from("OnlineSafetyAwareness");
        let mut input: &[u8] = b"1\nofficial\n1\nn\n";
        let mut out = Vec::new();

        run(&svc, &module_id, &mut input, &mut out).await.unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Online Safety Awareness"));
        assert!(text.contains("3/3 correct"));
        assert!(text.contains("Saved completion #1"));
        let rows = storage
            .completions
            .list_completions(&module_id, 5)
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn bad_input_reprompts_and_eof_exits() {
        let storage = Storage::in_memory(Catalog::builtin().unwrap());
        let svc = service(&storage);
        let mut input: &[u8] = b"9\nnope\n2\n";
        let mut out = Vec::new();

        run(&svc, &ModuleId::from("OnlineSafetyAwareness"), &mut input, &mut out)
            .await
            .unwrap();

        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.matches("Pick 1-2").count(), 2);
        assert!(text.contains("Not quite."));
        assert!(text.ends_with("bye\n"));
    }

    #[tokio::test]
    async fn retry_plays_the_module_again() {
        let storage = Storage::in_memory(Catalog::builtin().unwrap());
        let svc = service(&storage);
        let mut input: &[u8] = b"2\n2\n2\ny\n1\n1\n1\nn\n";
        let mut out = Vec::new();

        run(&svc, &ModuleId::from("OnlineSafetyAwareness"), &mut input, &mut out)
            .await
            .unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("0/3 correct"));
        assert!(text.contains("Not passed this time. +0 coins, +0 xp"));
        assert!(text.contains("3/3 correct"));
        assert!(text.contains("Saved completion #1"));
    }
}
