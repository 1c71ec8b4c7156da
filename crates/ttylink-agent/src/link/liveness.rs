//! Keepalive liveness accounting
//!
//! Countdown of tolerated missed probe responses. Pure state so the dead
//! connection decision is testable without a clock or a socket.

/// Liveness credit for the control connection
#[derive(Debug)]
pub struct Liveness {
    credit: u32,
    budget: u32,
}

impl Liveness {
    /// Full credit, as granted when the connection opens
    pub fn new(budget: u32) -> Self {
        Self {
            credit: budget,
            budget,
        }
    }

    /// Account for a keepalive tick. Returns `false` when the credit was
    /// already exhausted: the peer missed every probe in the budget and the
    /// connection must be treated as dead. Otherwise consumes one credit
    /// (the caller sends a `ping` that may earn it back).
    pub fn on_tick(&mut self) -> bool {
        if self.credit == 0 {
            return false;
        }
        self.credit -= 1;
        true
    }

    /// A `pong` arrived: restore full credit
    pub fn on_pong(&mut self) {
        self.credit = self.budget;
    }
}
