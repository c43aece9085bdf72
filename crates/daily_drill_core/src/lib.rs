pub mod domain;
pub mod ports;
pub mod services;
pub mod time;

pub use domain::{
    Answer, AuthSession, DailyOverview, DailyQuestion, DailySet, Feedback, HistoryDay,
    HistoryEntry, Question, ScoreCard, User, UserCredentials,
};
pub use ports::{NewAnswer, PortError, PortResult, RecordStore, ScoringService};
pub use services::{
    HistoryAggregator, ServiceError, SessionAssigner, SubmissionController, SubmissionOutcome,
};
pub use time::Clock;
