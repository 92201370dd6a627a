/// The two debts an endpoint can owe its requester.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryLatches {
    owes_req: bool,
    owes_resp: bool,
}

impl RetryLatches {
    /// A request was refused; the sender must be poked when capacity returns.
    pub fn owe_request_retry(&mut self) {
        self.owes_req = true;
    }

    /// Clears the request latch, returning whether a retry was owed.
    pub fn take_request_retry(&mut self) -> bool {
        std::mem::take(&mut self.owes_req)
    }

    /// The peer refused a response and will call back with a response retry.
    pub fn await_response_retry(&mut self) {
        assert!(!self.owes_resp, "already waiting for a response retry");
        self.owes_resp = true;
    }

    /// Returns whether a response retry was expected, clearing the latch.
    pub fn take_response_retry(&mut self) -> bool {
        std::mem::take(&mut self.owes_resp)
    }

    pub fn owes_request_retry(&self) -> bool {
        self.owes_req
    }

    pub fn awaiting_response_retry(&self) -> bool {
        self.owes_resp
    }

    pub fn any(&self) -> bool {
        self.owes_req || self.owes_resp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latches_set_and_clear_independently() {
        let mut latches = RetryLatches::default();
        assert!(!latches.any());
        latches.owe_request_retry();
        latches.owe_request_retry();
        assert!(latches.owes_request_retry());
        assert!(!latches.awaiting_response_retry());
        latches.await_response_retry();
        assert!(latches.take_request_retry());
        assert!(!latches.take_request_retry());
        assert!(latches.any());
        assert!(latches.take_response_retry());
        assert!(!latches.any());
    }

    #[test]
    #[should_panic(expected = "already waiting")]
    fn second_response_refusal_panics() {
        let mut latches = RetryLatches::default();
        latches.await_response_retry();
        latches.await_response_retry();
    }
}
