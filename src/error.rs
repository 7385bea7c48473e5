use thiserror::Error;

/// Crate-wide result alias, mirroring the `CResult` convention used
/// throughout the store and processor modules.
pub type CResult<T> = std::result::Result<T, Error>;

/// All failure modes the core can produce.
///
/// Variants are split along the line that matters to the dispatcher
/// (`tryHandleError` in spec terms): [`Error::NoSuchResource`] and
/// [`Error::ActiveProcessInstances`] are *expected* — they become a
/// rejection and the command advances. Everything else is fatal: the
/// transaction is aborted and the partition halts for the supervising
/// layer to recover from the log.
#[derive(Debug, Error)]
pub enum Error {
    /// Classification found neither a process nor a DRG at the given key.
    #[error("no such resource: {0}")]
    NoSuchResource(i64),

    /// The process has active instances and cannot be deleted yet.
    #[error("process {0} has active process instances")]
    ActiveProcessInstances(i64),

    /// A record could not be encoded/decoded to or from its wire format.
    #[error("codec error: {0}")]
    CodecError(String),

    /// `deleteExisting`/`update` targeted a primary key that is not present.
    #[error("missing primary key in column family {0:?}")]
    MissingPrimary(crate::columns::ColumnFamily),

    /// A write through a [`crate::kv::key::ForeignKey`] referenced an absent primary key.
    #[error("foreign key violation: {0} does not exist in {1:?}")]
    ForeignKeyViolation(String, crate::columns::ColumnFamily),

    /// A peer send failed. Handled internally by the distributor's retry
    /// loop; this variant only surfaces in tests and logs, never to a
    /// command.
    #[error("distribution transport error: {0}")]
    DistributionTransportError(String),

    /// No processor is registered for this record's `(value_type, intent)`
    /// pair. A wiring bug, not a data problem — fatal.
    #[error("no processor registered for value_type {0:?} intent {1:?}")]
    UnroutableCommand(crate::commands::ValueType, crate::commands::Intent),

    /// The embedded byte-key engine reported an I/O failure.
    #[error("engine I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Classification used by [`crate::dispatch::Dispatcher`] to decide
    /// whether to continue past a command (expected) or halt the
    /// partition (unexpected).
    pub fn classify(&self) -> ErrorClassification {
        match self {
            Error::NoSuchResource(_) | Error::ActiveProcessInstances(_) => {
                ErrorClassification::Expected
            }
            _ => ErrorClassification::Unexpected,
        }
    }

    /// The wire-level rejection kind for an expected error, if any.
    pub fn rejection_kind(&self) -> Option<crate::rejection::RejectionKind> {
        match self {
            Error::NoSuchResource(_) => Some(crate::rejection::RejectionKind::NotFound),
            Error::ActiveProcessInstances(_) => Some(crate::rejection::RejectionKind::InvalidState),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClassification {
    Expected,
    Unexpected,
}
