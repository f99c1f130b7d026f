mod note;
mod reading;
mod reminder;

pub use note::Note;
pub use reading::{Reading, ReadingFilter, ReadingStatus};
pub use reminder::{Reminder, ReminderDetail};
