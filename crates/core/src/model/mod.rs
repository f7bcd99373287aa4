mod chapter;
mod ids;
mod outline;
mod progress;

pub use ids::{ChapterId, CourseId, LearnerId, ParseIdError};

pub use chapter::{Chapter, ChapterError};
pub use outline::{CourseOutline, OutlineError};
pub use progress::{
    BadgeRecord, ChapterProgress, ChapterState, CompletionRecord, ProgressSnapshot,
    completion_percentage,
};
