pub mod attendance;
pub mod mark;
pub mod student;
pub mod subject;

pub use attendance::{
    Attendance, AttendanceKey, AttendanceStatus, CreateAttendanceRequest, UpdateAttendanceRequest,
};
pub use mark::{CreateMarkRequest, ExamType, Mark, MarkKey, UpdateMarkRequest};
pub use student::{AttendanceEntry, EntryChange, MarkEntry, Student};
pub use subject::{Department, Subject};
