//! Stock subscribers.
//!
//! | Subscriber                | Events                     | Priority |
//! |---------------------------|----------------------------|----------|
//! | [`HistorySubscriber`]     | all                        | 100      |
//! | [`LoggerSubscriber`]      | sent, errored              | 0        |
//! | [`MetricsSubscriber`]     | all                        | -50      |
//! | [`CacheSubscriber`]       | created, sent              | -100     |
//! | [`RetrySubscriber`]       | errored                    | -150     |
//! | [`StatusCodeSubscriber`]  | sent                       | -200     |

mod cache;
mod history;
mod logger;
mod metrics;
mod retry;
mod status_code;

pub use cache::{CacheSubscriber, CACHE_PRIORITY};
pub use history::{HistorySubscriber, HISTORY_PRIORITY};
pub use logger::{LoggerSubscriber, LOGGER_PRIORITY};
pub use metrics::{MetricsSubscriber, METRICS_PRIORITY};
pub use retry::{RetrySubscriber, RETRY_PRIORITY};
pub use status_code::{StatusCodeSubscriber, STATUS_CODE_PRIORITY};
