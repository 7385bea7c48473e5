//! Rejection kinds producible by this core. Other kinds exist on the wire
//! but are produced by processors outside this crate's scope.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionKind {
    NotFound,
    InvalidState,
}

impl RejectionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RejectionKind::NotFound => "NOT_FOUND",
            RejectionKind::InvalidState => "INVALID_STATE",
        }
    }
}

impl std::fmt::Display for RejectionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
