//! Rate limiting logic and state management.

mod clock;
mod counter;
mod limiter;
mod quota;
mod rules;

pub use clock::{Clock, ManualClock, SystemClock};
pub use counter::{Decision, WindowCounter};
pub use limiter::{LimitEntry, RateLimitInfo, RateLimiter};
pub use quota::{Quota, DEFAULT_LIMIT, DEFAULT_WINDOW_MS};
pub use rules::{OverrideRule, RuleSet};
