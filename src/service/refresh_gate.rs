/// Identifies one fetch started by the gate.
pub type Ticket = u64;

/// Coalesces refresh requests so at most one fetch runs at a time.
///
/// Requests that arrive while a fetch is in flight collapse into a single
/// follow-up fetch started when the current one completes. Completions for a
/// ticket that is not the in-flight one are stale and must be dropped.
#[derive(Debug, Default)]
pub struct RefreshGate {
    in_flight: Option<Ticket>,
    pending: bool,
    last_ticket: Ticket,
}

#[derive(Debug, PartialEq, Eq)]
pub enum Completion {
    /// Not the in-flight ticket; ignore its result.
    Stale,
    /// Apply the result; start `next` if another refresh was requested meanwhile.
    Apply { next: Option<Ticket> },
}

impl RefreshGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask for a refresh. Returns the ticket to fetch with when idle.
    pub fn request(&mut self) -> Option<Ticket> {
        if self.in_flight.is_some() {
            self.pending = true;
            return None;
        }
        Some(self.start())
    }

    pub fn complete(&mut self, ticket: Ticket) -> Completion {
        if self.in_flight != Some(ticket) {
            return Completion::Stale;
        }
        self.in_flight = None;
        let next = if std::mem::take(&mut self.pending) {
            Some(self.start())
        } else {
            None
        };
        Completion::Apply { next }
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Forget the in-flight fetch; its completion becomes stale.
    pub fn reset(&mut self) {
        self.in_flight = None;
        self.pending = false;
    }

    fn start(&mut self) -> Ticket {
        self.last_ticket += 1;
        self.in_flight = Some(self.last_ticket);
        self.last_ticket
    }
}
