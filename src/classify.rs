use crate::directive::{AsyncOperation, Directive, KeepWaiting};
use crate::error::Error;

/// How the scheduler must treat a yielded directive.
///
/// Produced once per directive per tick, and consumed by the scheduler's single dispatch point.
/// The polling variants borrow the directive so that it is polled there, exactly once.
pub enum Verdict<'d> {
    /// Step the coroutine now.
    Resume,
    /// Step once the predicate stops asking to wait.
    PollUntilFlagTrue(&'d mut dyn KeepWaiting),
    /// Step once the external operation reports completion.
    PollUntilDone(&'d dyn AsyncOperation),
    /// No safe suspension semantics: terminate the coroutine.
    Unsupported(Unsupported),
}

/// Why a directive was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Unsupported {
    pub kind: &'static str,
    pub reason: &'static str,
}

impl From<Unsupported> for Error {
    fn from(unsupported: Unsupported) -> Self {
        Error::UnsupportedDirective {
            kind: unsupported.kind,
            reason: unsupported.reason,
        }
    }
}

/// Treatment of [`Directive::Other`] values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnknownDirectives {
    /// Resume on the next tick, so that coroutines written for other drivers still run.
    #[default]
    PassThrough,
    /// Reject them as unsupported.
    Reject,
}

const USE_REALTIME: &str = "fixed duration waits do not advance here, use WaitRealtime instead";
const UNKNOWN: &str = "unknown directive kinds are rejected by configuration";

/// Classify a directive. Total: every directive gets a verdict.
///
/// First match wins: empty, predicate, external operation, fixed duration, then anything else.
pub fn classify(directive: &mut Directive, unknown: UnknownDirectives) -> Verdict<'_> {
    match directive {
        Directive::Tick => Verdict::Resume,
        Directive::KeepWaiting(waiting) => Verdict::PollUntilFlagTrue(&mut **waiting),
        Directive::Operation(operation) => Verdict::PollUntilDone(&**operation),
        Directive::Seconds(_) => Verdict::Unsupported(Unsupported {
            kind: "Seconds",
            reason: USE_REALTIME,
        }),
        Directive::SecondsRealtime(_) => Verdict::Unsupported(Unsupported {
            kind: "SecondsRealtime",
            reason: USE_REALTIME,
        }),
        Directive::Other { kind, .. } => match unknown {
            UnknownDirectives::PassThrough => Verdict::Resume,
            UnknownDirectives::Reject => Verdict::Unsupported(Unsupported {
                kind: *kind,
                reason: UNKNOWN,
            }),
        },
    }
}
