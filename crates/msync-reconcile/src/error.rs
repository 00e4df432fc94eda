use std::fmt;

use msync_api::{ApiError, ErrorKind};

/// Remote step that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStep {
    LookupUser,
    CreateUser,
    LookupRoom,
    CreateRoom,
    ReadRoomName,
    WriteRoomName,
    ReadPowerLevels,
    WritePowerLevels,
    ReadRoomState,
    Join,
}

impl SyncStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStep::LookupUser => "lookup_user",
            SyncStep::CreateUser => "create_user",
            SyncStep::LookupRoom => "lookup_room",
            SyncStep::CreateRoom => "create_room",
            SyncStep::ReadRoomName => "read_room_name",
            SyncStep::WriteRoomName => "write_room_name",
            SyncStep::ReadPowerLevels => "read_power_levels",
            SyncStep::WritePowerLevels => "write_power_levels",
            SyncStep::ReadRoomState => "read_room_state",
            SyncStep::Join => "join",
        }
    }
}

impl fmt::Display for SyncStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One room of the payload whose work failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomFailure {
    pub alias: String,
    pub error: SyncError,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// A single remote step failed.
    Step {
        step: SyncStep,
        /// User id, room id or alias the step addressed.
        target: String,
        source: ApiError,
    },
    /// One or more rooms of the payload failed; sibling rooms ran to completion.
    Rooms { failures: Vec<RoomFailure> },
}

impl SyncError {
    pub fn step(step: SyncStep, target: impl Into<String>, source: ApiError) -> Self {
        SyncError::Step {
            step,
            target: target.into(),
            source,
        }
    }

    /// Kind of the first underlying homeserver error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SyncError::Step { source, .. } => source.kind,
            SyncError::Rooms { failures } => failures
                .first()
                .map(|f| f.error.kind())
                .unwrap_or(ErrorKind::Fatal),
        }
    }
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncError::Step {
                step,
                target,
                source,
            } => write!(f, "{step} failed for {target}: {source}"),
            SyncError::Rooms { failures } => {
                write!(f, "{} room(s) failed to sync:", failures.len())?;
                for rf in failures {
                    write!(f, " [{}] {};", rf.alias, rf.error)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for SyncError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SyncError::Step { source, .. } => Some(source),
            SyncError::Rooms { .. } => None,
        }
    }
}
