use crate::engine::error::EngineError;
use crate::model::config::SessionConfig;
use crate::model::debrief::{Debriefing, Outcome};
use crate::model::metrics::MetricsState;
use crate::model::reply_decode::{FeedbackReply, TurnReply};
use crate::model::scenario::Scenario;
use crate::model::turn::TurnRecord;

/// Engine lifecycle. One session moves strictly forward through these;
/// `Reset` is the only way back to `Setup`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnginePhase {
    Setup,
    AwaitingScenario,
    ScenarioReady,
    TurnInFlight,
    /// Transient: a turn's effects are being applied.
    TurnResolved,
    Terminating,
    Complete,
}

/// All generator calls for one turn, completed on a worker thread before
/// anything is applied. Either the whole bundle lands or none of it does.
#[derive(Debug, Clone)]
pub struct ResolvedTurn {
    pub user_action: String,
    pub feedback: FeedbackReply,
    pub counterpart: TurnReply,
    /// Cheap termination probe verdict; `None`/`Draw` means keep going.
    pub probe: Option<Outcome>,
}

/// RGBA bytes ready for the UI to upload as a texture.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

#[derive(Debug)]
pub enum EngineCommand {
    Configure(SessionConfig),
    RequestScenario,
    SubmitChoice(usize),
    SubmitFreeText(String),
    Reset,
    Shutdown,

    // Worker-posted results. The UI never sends these; they re-enter the
    // command queue so the engine thread stays single-writer. Each carries
    // the session epoch it was started under so results that outlive a
    // reset are discarded instead of applied.
    ScenarioArrived {
        epoch: u64,
        result: Result<Scenario, EngineError>,
    },
    TurnArrived {
        epoch: u64,
        result: Result<ResolvedTurn, EngineError>,
    },
    DebriefArrived {
        epoch: u64,
        debriefing: Box<Debriefing>,
    },
    IllustrationArrived {
        epoch: u64,
        image: DecodedImage,
    },
}

#[derive(Debug)]
pub enum EngineResponse {
    PhaseChanged(EnginePhase),
    ScenarioChanged(Scenario),
    HistoryChanged(Vec<TurnRecord>),
    MetricsChanged(MetricsState),
    IllustrationReady(DecodedImage),
    /// A submission arrived while another turn was in flight (or was
    /// otherwise invalid). Nothing was queued.
    SubmissionRejected { reason: String },
    /// Recoverable failure: the turn was rolled back, the user may retry.
    RecoverableError { message: String },
    /// Configuration failure: the session is over, back to setup.
    SessionAborted { message: String },
    DebriefReady(Box<Debriefing>),
}
