//! Birthday tracking core: the durable record store and the pure
//! date-computation engine the Discord layer queries.

mod engine;
mod store;

pub use engine::{DateError, UpcomingBirthday, due_today, next_occurrence, upcoming, validate_date};
pub use store::{BirthdayRecord, BirthdayStore, StoreError};

use chrono::NaiveDate;

/// Greeting used when a record carries no custom message.
pub const DEFAULT_GREETING: &str = "Have a wonderful day!";

/// Current calendar date on the local clock.
pub fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}
