pub mod context;
pub mod decorators;
pub mod error;
pub mod evaluator;
pub mod locks;
pub mod metadata;
pub mod output_format;
pub mod rate_limit;
pub mod runner;
pub mod timeout;
pub mod unit;

mod decorator_tests;

pub use context::{ScoreSetter, Setter, TestContext};
pub use decorators::{
    decorate, AvailableFrom, CustomOutput, Decorator, HideErrors, Leaderboard, Number,
    PartialCredit, SetVisibility, Tags, Timeout, Weight,
};
pub use error::{fail, skip, AssertionFailure, GradingError, TestSkipped, TestTimeout};
pub use locks::{LockConfig, LockingRunner};
pub use rate_limit::RateLimiter;
pub use runner::{write_report, JsonTestRunner};
pub use unit::{Outcome, TestSuite, TestUnit};
