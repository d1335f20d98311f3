/// Decorator stacking scenarios, run end to end through the runner
///
/// These tests verify that:
/// 1. Static decorators land on the record (weight, visibility)
/// 2. Timeouts pass fast bodies and fail slow ones
/// 3. Values reported through setters survive any wrapping order
/// 4. A timeout keeps the score reported before the deadline
/// 5. Custom output modes combine with failure text as documented
/// 6. A body that blocks its thread is still failed by its timeout

#[cfg(test)]
mod stacking_tests {
    use crate::decorators::{
        decorate, CustomOutput, Decorator, Leaderboard, PartialCredit, SetVisibility, Tags,
        Timeout, Weight,
    };
    use crate::error::fail;
    use crate::runner::JsonTestRunner;
    use crate::unit::TestUnit;
    use gradekit_common::types::{OutputFormat, Report, TestStatus, Visibility};
    use serde_json::json;
    use std::time::Duration;

    /// Decorate a single unit (first decorator outermost) and run it on its own
    async fn run_test_with_decorators(decorators: Vec<Box<dyn Decorator>>, unit: TestUnit) -> Report {
        let unit = decorate(unit, &decorators).expect("decorators should validate");
        JsonTestRunner::new()
            .default_visibility(Visibility::Visible)
            .run(&[unit])
            .await
    }

    fn passing() -> TestUnit {
        TestUnit::new("test_foo", |_| async { Ok(()) })
    }

    fn failing(message: &'static str) -> TestUnit {
        TestUnit::new("test_foo", move |_| async move { Err(fail(message)) })
    }

    fn sleeping(seconds: u64) -> TestUnit {
        TestUnit::new("test_foo", move |_| async move {
            tokio::time::sleep(Duration::from_secs(seconds)).await;
            Ok(())
        })
    }

    fn scoring_then_sleeping() -> TestUnit {
        TestUnit::new("test_foo", |ctx| async move {
            ctx.set_score(0.5)?;
            tokio::time::sleep(Duration::from_secs(2)).await;
            ctx.set_score(1.0)?;
            Ok(())
        })
    }

    fn scoring(score: f64) -> TestUnit {
        TestUnit::new("test_foo", move |ctx| async move {
            ctx.set_score(score)?;
            Ok(())
        })
    }

    fn reporting_leaderboard(delay_s: u64) -> TestUnit {
        TestUnit::new("test_foo", move |ctx| async move {
            tokio::time::sleep(Duration::from_secs(delay_s)).await;
            ctx.set_leaderboard_value(42)?;
            Ok(())
        })
    }

    fn custom_output_then_fail(text: &'static str) -> TestUnit {
        TestUnit::new("test_foo", move |ctx| async move {
            ctx.set_custom_output(text)?;
            Err(fail("This is a test error"))
        })
    }

    /// Every ordering of `0..n`
    fn permutations(n: usize) -> Vec<Vec<usize>> {
        if n == 0 {
            return vec![Vec::new()];
        }
        let mut all = Vec::new();
        for order in permutations(n - 1) {
            for slot in 0..=order.len() {
                let mut next = order.clone();
                next.insert(slot, n - 1);
                all.push(next);
            }
        }
        all
    }

    fn html(mode: &str) -> Box<dyn Decorator> {
        Box::new(CustomOutput::parse("html", mode).unwrap())
    }

    #[tokio::test]
    async fn test_weight_passed() {
        let report = run_test_with_decorators(vec![Box::new(Weight(2.0))], passing()).await;
        let test = &report.tests[0];
        assert_eq!(test.max_score, 2.0);
        assert_eq!(test.score, 2.0);
        assert_eq!(test.status, Some(TestStatus::Passed));
    }

    #[tokio::test]
    async fn test_weight_failed() {
        let report = run_test_with_decorators(vec![Box::new(Weight(3.0))], failing("Failure")).await;
        let test = &report.tests[0];
        assert_eq!(test.max_score, 3.0);
        assert_eq!(test.score, 0.0);
        assert_eq!(test.status, Some(TestStatus::Failed));
        assert_eq!(test.output, "Test Failed: Failure\n");
    }

    #[tokio::test]
    async fn test_visibility_hidden() {
        let report = run_test_with_decorators(
            vec![
                Box::new(SetVisibility::parse("hidden").unwrap()) as Box<dyn Decorator>,
                Box::new(Tags::new(["io"])),
            ],
            passing(),
        )
        .await;
        assert_eq!(report.tests[0].visibility, Visibility::Hidden);
        assert_eq!(report.tests[0].status, Some(TestStatus::Passed));
        assert_eq!(report.tests[0].tags, Some(vec!["io".to_string()]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_success() {
        for decorators in [
            vec![Box::new(Timeout::seconds(1)) as Box<dyn Decorator>, Box::new(Weight(1.0))],
            vec![Box::new(Weight(1.0)) as Box<dyn Decorator>, Box::new(Timeout::seconds(1))],
        ] {
            let report = run_test_with_decorators(decorators, passing()).await;
            assert_eq!(report.tests[0].status, Some(TestStatus::Passed));
            assert_eq!(report.tests[0].max_score, 1.0);
            assert_eq!(report.tests[0].score, 1.0);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_failure() {
        let report = run_test_with_decorators(
            vec![Box::new(Timeout::seconds(1)) as Box<dyn Decorator>, Box::new(Weight(1.0))],
            sleeping(2),
        )
        .await;
        let test = &report.tests[0];
        assert_eq!(test.status, Some(TestStatus::Failed));
        assert_eq!(test.max_score, 1.0);
        assert_eq!(test.score, 0.0);
        assert_eq!(test.output, "Test Failed: test timed out after 1s.\n");
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_custom_message() {
        let report = run_test_with_decorators(
            vec![Box::new(Timeout::seconds(1).message("Too slow, try a better algorithm"))],
            sleeping(5),
        )
        .await;
        assert_eq!(report.tests[0].output, "Test Failed: Too slow, try a better algorithm\n");
    }

    #[tokio::test]
    async fn test_partial_credit_success() {
        let report = run_test_with_decorators(vec![Box::new(PartialCredit(1.0))], scoring(1.0)).await;
        let test = &report.tests[0];
        assert_eq!(test.max_score, 1.0);
        assert_eq!(test.score, 1.0);
        assert_eq!(test.status, Some(TestStatus::Passed));
    }

    #[tokio::test]
    async fn test_partial_credit_failure() {
        let report = run_test_with_decorators(vec![Box::new(PartialCredit(1.0))], scoring(0.5)).await;
        let test = &report.tests[0];
        assert_eq!(test.max_score, 1.0);
        assert_eq!(test.score, 0.5);
        assert_eq!(test.status, Some(TestStatus::Failed));
    }

    #[tokio::test(start_paused = true)]
    async fn test_partial_credit_timeout_stacking_passed() {
        for decorators in [
            vec![Box::new(PartialCredit(1.0)) as Box<dyn Decorator>, Box::new(Timeout::seconds(1))],
            vec![Box::new(Timeout::seconds(1)) as Box<dyn Decorator>, Box::new(PartialCredit(1.0))],
        ] {
            let report = run_test_with_decorators(decorators, scoring(1.0)).await;
            assert_eq!(report.tests[0].max_score, 1.0);
            assert_eq!(report.tests[0].score, 1.0);
            assert_eq!(report.tests[0].status, Some(TestStatus::Passed));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_partial_credit_timeout_stacking_failed() {
        for decorators in [
            vec![Box::new(PartialCredit(1.0)) as Box<dyn Decorator>, Box::new(Timeout::seconds(1))],
            vec![Box::new(Timeout::seconds(1)) as Box<dyn Decorator>, Box::new(PartialCredit(1.0))],
        ] {
            let report = run_test_with_decorators(decorators, scoring_then_sleeping()).await;
            assert_eq!(report.tests[0].max_score, 1.0);
            assert_eq!(report.tests[0].score, 0.5);
            assert_eq!(report.tests[0].status, Some(TestStatus::Failed));
        }
    }

    #[tokio::test]
    async fn test_leaderboard() {
        let report =
            run_test_with_decorators(vec![Box::new(Leaderboard::new("score"))], reporting_leaderboard(0))
                .await;
        assert_eq!(report.leaderboard[0].name, "score");
        assert_eq!(report.leaderboard[0].value, Some(json!(42)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stacking_leaderboard_timeout() {
        for decorators in [
            vec![Box::new(Leaderboard::new("score")) as Box<dyn Decorator>, Box::new(Timeout::seconds(1))],
            vec![Box::new(Timeout::seconds(1)) as Box<dyn Decorator>, Box::new(Leaderboard::new("score"))],
        ] {
            let report = run_test_with_decorators(decorators, reporting_leaderboard(0)).await;
            assert_eq!(report.leaderboard[0].name, "score");
            assert_eq!(report.leaderboard[0].value, Some(json!(42)));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stacking_leaderboard_timeout_failure() {
        let report = run_test_with_decorators(
            vec![Box::new(Timeout::seconds(1)) as Box<dyn Decorator>, Box::new(Leaderboard::new("score"))],
            reporting_leaderboard(2),
        )
        .await;
        assert_eq!(report.leaderboard[0].name, "score");
        assert_eq!(report.leaderboard[0].value, None);
        assert_eq!(serde_json::to_value(&report).unwrap()["leaderboard"][0]["value"], json!(null));
    }

    #[tokio::test]
    async fn test_custom_output_mode_error_only() {
        let report = run_test_with_decorators(
            vec![html("error_only"), Box::new(Weight(2.0))],
            failing("This is a test error"),
        )
        .await;
        let test = &report.tests[0];
        assert_eq!(test.status, Some(TestStatus::Failed));
        assert_eq!(test.output_format, OutputFormat::Html);
        assert_eq!(test.output, "Test Failed: This is a test error\n");
    }

    #[tokio::test]
    async fn test_custom_output_mode_error_only_has_no_setter() {
        let report = run_test_with_decorators(
            vec![html("error_only")],
            custom_output_then_fail("never shown"),
        )
        .await;
        assert_eq!(report.tests[0].status, Some(TestStatus::Error));
        assert!(report.tests[0].output.contains("set_custom_output"));
    }

    #[tokio::test]
    async fn test_custom_output_mode_replace() {
        let report = run_test_with_decorators(
            vec![html("replace"), Box::new(Weight(2.0))],
            custom_output_then_fail("Output will be overridden!"),
        )
        .await;
        let test = &report.tests[0];
        assert_eq!(test.status, Some(TestStatus::Failed));
        assert_eq!(test.output_format, OutputFormat::Html);
        assert_eq!(test.output, "Output will be overridden!");
    }

    #[tokio::test]
    async fn test_custom_output_mode_append() {
        let report = run_test_with_decorators(
            vec![html("append"), Box::new(Weight(2.0))],
            custom_output_then_fail("Output will be appended!"),
        )
        .await;
        let test = &report.tests[0];
        assert_eq!(test.status, Some(TestStatus::Failed));
        assert_eq!(test.output_format, OutputFormat::Html);
        assert_eq!(test.output, "Test Failed: This is a test error\n\nOutput will be appended!");
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_output_timeout_weight_stacking() {
        let decorator_orders: [fn() -> Vec<Box<dyn Decorator>>; 2] = [
            || vec![html("replace"), Box::new(Timeout::seconds(1)), Box::new(Weight(2.0))],
            || vec![Box::new(Weight(2.0)) as Box<dyn Decorator>, Box::new(Timeout::seconds(1)), html("replace")],
        ];
        for decorators in decorator_orders {
            let unit = TestUnit::new("test_foo", |ctx| async move {
                ctx.set_custom_output("Here is my output message.")?;
                Ok(())
            });
            let report = run_test_with_decorators(decorators(), unit).await;
            let test = &report.tests[0];
            assert_eq!(test.status, Some(TestStatus::Passed));
            assert_eq!(test.max_score, 2.0);
            assert_eq!(test.score, 2.0);
            assert_eq!(test.output_format, OutputFormat::Html);
            assert_eq!(test.output, "Here is my output message.");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_every_order_of_three_stateful_decorators_agrees() {
        let all: [fn() -> Box<dyn Decorator>; 3] = [
            || Box::new(PartialCredit(4.0)),
            || Box::new(Leaderboard::new("speed")),
            || Box::new(Timeout::seconds(3)),
        ];
        let orders = [[0, 1, 2], [0, 2, 1], [1, 0, 2], [1, 2, 0], [2, 0, 1], [2, 1, 0]];

        for order in orders {
            let decorators: Vec<Box<dyn Decorator>> = order.iter().map(|&i| all[i]()).collect();
            let unit = TestUnit::new("test_foo", |ctx| async move {
                ctx.set_score(3.0)?;
                ctx.set_leaderboard_value(7.25)?;
                ctx.println("done");
                Ok(())
            });
            let report = run_test_with_decorators(decorators, unit).await;
            let test = &report.tests[0];
            assert_eq!(test.score, 3.0, "order {order:?}");
            assert_eq!(test.max_score, 4.0, "order {order:?}");
            assert_eq!(test.status, Some(TestStatus::Failed), "order {order:?}");
            assert_eq!(test.output, "done\n", "order {order:?}");
            assert_eq!(report.leaderboard[0].value, Some(json!(7.25)), "order {order:?}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_every_order_with_weight_and_custom_output_agrees() {
        let all: [fn() -> Box<dyn Decorator>; 4] = [
            || Box::new(Weight(2.0)),
            || html("replace"),
            || Box::new(Leaderboard::new("speed")),
            || Box::new(Timeout::seconds(3)),
        ];
        let orders = permutations(all.len());
        assert_eq!(orders.len(), 24);

        for order in orders {
            let decorators: Vec<Box<dyn Decorator>> = order.iter().map(|&i| all[i]()).collect();
            let unit = TestUnit::new("test_foo", |ctx| async move {
                ctx.set_custom_output("<b>fast</b>")?;
                ctx.set_leaderboard_value(1.5)?;
                Ok(())
            });
            let report = run_test_with_decorators(decorators, unit).await;
            let test = &report.tests[0];
            assert_eq!(test.status, Some(TestStatus::Passed), "order {order:?}");
            assert_eq!(test.score, 2.0, "order {order:?}");
            assert_eq!(test.max_score, 2.0, "order {order:?}");
            assert_eq!(test.output_format, OutputFormat::Html, "order {order:?}");
            assert_eq!(test.output, "<b>fast</b>", "order {order:?}");
            assert_eq!(report.leaderboard[0].value, Some(json!(1.5)), "order {order:?}");
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_timeout_fails_blocking_body() {
        let unit = TestUnit::new("test_foo", |_| async {
            std::thread::sleep(Duration::from_secs(3));
            Ok(())
        });
        let started = std::time::Instant::now();
        let report = run_test_with_decorators(vec![Box::new(Timeout::seconds(1))], unit).await;
        let test = &report.tests[0];
        assert_eq!(test.status, Some(TestStatus::Failed));
        assert_eq!(test.score, 0.0);
        assert_eq!(test.output, "Test Failed: test timed out after 1s.\n");
        assert!(started.elapsed() < Duration::from_millis(2500));
    }
}
