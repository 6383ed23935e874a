pub mod calendar;
pub mod instances;
pub mod reminder;
pub mod scheduler;

pub use calendar::{CalendarEntry, CalendarService, CalendarView};
pub use instances::InstanceService;
pub use reminder::{ReminderService, ReminderStats};
pub use scheduler::ReminderScheduler;
