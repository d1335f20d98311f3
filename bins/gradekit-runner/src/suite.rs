// Registered grading suite for the sample assignment.
//
// The student submits `answers.txt` (one answer per line) and optionally a rendered
// `plot.jpg`. Checks read the submission directory and never modify it.

use gradekit_common::types::{CustomOutputMode, OutputFormat, SortOrder, Visibility};
use gradekit_harness::decorators::{
    AvailableFrom, CustomOutput, HideErrors, Leaderboard, Number, PartialCredit, SetVisibility,
    Tags, Timeout, Weight,
};
use gradekit_harness::error::{fail, GradingError};
use gradekit_harness::output_format::image_to_html;
use gradekit_harness::unit::{TestSuite, TestUnit};
use std::path::{Path, PathBuf};

pub const ANSWERS_FILE: &str = "answers.txt";
pub const PLOT_FILE: &str = "plot.jpg";
pub const EXPECTED_ANSWERS: [&str; 4] = ["42", "3.14", "hello", "true"];
pub const BONUS_UNLOCK: &str = "2099-01-01T00:00:00Z";

async fn read_answers(dir: &Path) -> anyhow::Result<Vec<String>> {
    let path = dir.join(ANSWERS_FILE);
    let content = match tokio::fs::read_to_string(&path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(fail(format!("{} not found in submission", ANSWERS_FILE)))
        }
        Err(e) => return Err(e.into()),
    };
    Ok(content.lines().map(|l| l.trim().to_string()).collect())
}

fn answers_present(dir: PathBuf) -> TestUnit {
    TestUnit::new("answers_present", move |_| {
        let dir = dir.clone();
        async move {
            read_answers(&dir).await?;
            Ok(())
        }
    })
    .describe("Submission contains answers.txt")
}

fn answers_correct(dir: PathBuf) -> TestUnit {
    TestUnit::new("answers_correct", move |ctx| {
        let dir = dir.clone();
        async move {
            let answers = read_answers(&dir).await?;
            let mut correct = 0;
            for (idx, expected) in EXPECTED_ANSWERS.iter().enumerate() {
                match answers.get(idx) {
                    Some(given) if given == expected => correct += 1,
                    Some(given) => ctx.println(format_args!("Question {}: got {:?}", idx + 1, given)),
                    None => ctx.println(format_args!("Question {}: no answer", idx + 1)),
                }
            }
            ctx.set_score(4.0 * correct as f64 / EXPECTED_ANSWERS.len() as f64)?;
            Ok(())
        }
    })
    .describe("Answers match the key")
}

fn answer_count(dir: PathBuf) -> TestUnit {
    TestUnit::new("answer_count", move |ctx| {
        let dir = dir.clone();
        async move {
            let answers = read_answers(&dir).await?;
            let given = answers.iter().filter(|a| !a.is_empty()).count();
            ctx.set_leaderboard_value(given)?;
            Ok(())
        }
    })
    .describe("Number of answers given")
}

fn plot_rendered(dir: PathBuf) -> TestUnit {
    TestUnit::new("plot_rendered", move |ctx| {
        let dir = dir.clone();
        async move {
            let bytes = match tokio::fs::read(dir.join(PLOT_FILE)).await {
                Ok(bytes) => bytes,
                Err(_) => return Err(fail(format!("{} not found in submission", PLOT_FILE))),
            };
            ctx.set_custom_output(image_to_html(&bytes))?;
            Ok(())
        }
    })
    .describe("Plot is rendered")
}

fn bonus(dir: PathBuf) -> TestUnit {
    TestUnit::new("bonus", move |_| {
        let dir = dir.clone();
        async move {
            let answers = read_answers(&dir).await?;
            if answers.len() <= EXPECTED_ANSWERS.len() {
                return Err(fail("no bonus answer given"));
            }
            Ok(())
        }
    })
    .describe("Bonus question")
}

/// The suite run against `submission_dir`
pub fn build(submission_dir: &Path) -> Result<TestSuite, GradingError> {
    let dir = submission_dir.to_path_buf();

    let answers = TestSuite::named("answers")
        .add(answers_present(dir.clone()).with(Number::new("1.1"))?.with(Weight(1.0))?)
        .add(
            answers_correct(dir.clone())
                .with(Number::new("1.2"))?
                .with(PartialCredit(4.0))?
                .with(Timeout::seconds(5))?
                .with(Tags::new(["answers"]))?,
        );

    let extras = TestSuite::named("extras")
        .add(
            answer_count(dir.clone())
                .with(Number::new("2.1"))?
                .with(Leaderboard::new("answers").order(SortOrder::Desc))?
                .with(Weight(0.0))?,
        )
        .add(
            plot_rendered(dir.clone())
                .with(Number::new("2.2"))?
                .with(CustomOutput::new(OutputFormat::Html, CustomOutputMode::Replace))?
                .with(HideErrors("No plot submitted".to_string()))?,
        )
        .add(
            bonus(dir)
                .with(Number::new("3.1"))?
                .with(Weight(1.0))?
                .with(SetVisibility(Visibility::AfterDueDate))?
                .with(AvailableFrom::parse(BONUS_UNLOCK)?.reason("Released with the next lab"))?,
        );

    Ok(TestSuite::named("sample assignment")
        .add_group(answers)
        .add_group(extras))
}
