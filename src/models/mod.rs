pub mod nullable;
pub mod task;

pub use task::{NewTaskRequest, Task, UpdateTaskRequest};
