use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("robot already registered: {id}")]
    DuplicateRobot { id: String },
    #[error("robot not found: {id}")]
    RobotNotFound { id: String },
    #[error("illegal transition for robot {robot}: {from} -> {to}")]
    IllegalTransition {
        robot: String,
        from: String,
        to: String,
    },
    #[error("invalid transition table: {0}")]
    InvalidTransitionTable(String),
    #[error("strategy {strategy} failed to initialize: {reason}")]
    StrategyInit { strategy: String, reason: String },
    #[error("strategy {0} is stopped")]
    StrategyStopped(String),
    #[error("unknown strategy code: {0}")]
    UnknownStrategy(String),
    #[error("channel closed: {0}")]
    ChannelClosed(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("benchmark error: {0}")]
    Benchmark(String),
    #[error("operation timed out: {0}")]
    Timeout(String),
    #[error("internal error: {0}")]
    Internal(String),
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;

impl SchedulerError {
    pub fn duplicate_robot<S: Into<String>>(id: S) -> Self {
        Self::DuplicateRobot { id: id.into() }
    }
    pub fn robot_not_found<S: Into<String>>(id: S) -> Self {
        Self::RobotNotFound { id: id.into() }
    }
    pub fn illegal_transition(
        robot: impl Into<String>,
        from: impl std::fmt::Display,
        to: impl std::fmt::Display,
    ) -> Self {
        Self::IllegalTransition {
            robot: robot.into(),
            from: from.to_string(),
            to: to.to_string(),
        }
    }
    pub fn strategy_init<S: Into<String>, R: Into<String>>(strategy: S, reason: R) -> Self {
        Self::StrategyInit {
            strategy: strategy.into(),
            reason: reason.into(),
        }
    }
    pub fn config_error<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }
    pub fn channel_closed<S: Into<String>>(msg: S) -> Self {
        Self::ChannelClosed(msg.into())
    }

    /// Errors that end a strategy run instead of being reported per call.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SchedulerError::Internal(_)
                | SchedulerError::Configuration(_)
                | SchedulerError::InvalidTransitionTable(_)
                | SchedulerError::StrategyInit { .. }
                | SchedulerError::UnknownStrategy(_)
        )
    }

    /// Caller broke the coordinator contract (bad id, bad transition).
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            SchedulerError::DuplicateRobot { .. }
                | SchedulerError::RobotNotFound { .. }
                | SchedulerError::IllegalTransition { .. }
        )
    }
}

impl From<serde_json::Error> for SchedulerError {
    fn from(err: serde_json::Error) -> Self {
        SchedulerError::Serialization(err.to_string())
    }
}

impl From<anyhow::Error> for SchedulerError {
    fn from(err: anyhow::Error) -> Self {
        SchedulerError::Internal(err.to_string())
    }
}
