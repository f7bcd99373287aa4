#![forbid(unsafe_code)]

pub mod app_services;
pub mod badge_evaluator;
pub mod course_graph;
pub mod error;
pub mod progress_service;
pub mod retry;

pub use course_core::Clock;

pub use app_services::AppServices;
pub use badge_evaluator::BadgeEvaluator;
pub use course_graph::CourseGraph;
pub use error::{AppServicesError, ProgressError};
pub use progress_service::{CompletionOutcome, ProgressService};
pub use retry::RetryPolicy;
