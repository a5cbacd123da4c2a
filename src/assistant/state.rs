//! Client phase and its allowed transitions

pub const STATUS_IDLE: &str = "Press Ctrl+R to speak";
pub const STATUS_LISTENING: &str = "Listening...";
pub const STATUS_PROCESSING: &str = "Processing...";
pub const STATUS_THINKING: &str = "Thinking...";
pub const STATUS_SPEAKING: &str = "Speaking...";
pub const STATUS_MIC_DENIED: &str = "Microphone access denied";
pub const STATUS_AUDIO_FAILED: &str = "Error - Ready to try again";
pub const STATUS_TEXT_FAILED: &str = "Error sending message";
pub const STATUS_BUSY: &str = "Still working...";

/// Assistant line shown when a typed message can't be delivered
pub const FALLBACK_REPLY: &str = "I'm having trouble connecting right now.";

/// Where the client is in a chat turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Recording,
    Processing,
    Speaking,
}

/// Events that move the client between phases
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    StartRecording,
    StopRecording,
    CancelRecording,
    SubmitText,
    ReplyWithAudio,
    ReplyWithoutAudio,
    RequestFailed,
    PlaybackEnded,
}

impl Phase {
    /// The phase after `transition`, or `None` if it isn't allowed from here
    pub fn next(self, transition: Transition) -> Option<Phase> {
        use Phase::*;
        use Transition::*;

        match (self, transition) {
            (Idle, StartRecording) => Some(Recording),
            (Idle, SubmitText) => Some(Processing),
            (Recording, StopRecording) => Some(Processing),
            (Recording, CancelRecording) => Some(Idle),
            (Processing, ReplyWithAudio) => Some(Speaking),
            (Processing, ReplyWithoutAudio) => Some(Idle),
            (Processing, RequestFailed) => Some(Idle),
            (Speaking, PlaybackEnded) => Some(Idle),
            _ => None,
        }
    }

    /// Status line shown while sitting in this phase
    pub fn status(self) -> &'static str {
        match self {
            Phase::Idle => STATUS_IDLE,
            Phase::Recording => STATUS_LISTENING,
            Phase::Processing => STATUS_PROCESSING,
            Phase::Speaking => STATUS_SPEAKING,
        }
    }

    pub fn is_busy(self) -> bool {
        matches!(self, Phase::Processing | Phase::Speaking)
    }
}
