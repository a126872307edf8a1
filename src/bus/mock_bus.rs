use super::{Bus, BusError, Result};
use std::collections::VecDeque;
use std::time::Duration;

/// In-memory bus for tests.
///
/// Reads pop scripted responses in order; `None` entries and an empty script
/// both behave like a read timeout.
#[derive(Debug, Default)]
pub struct MockBus {
    responses: VecDeque<Option<u8>>,
    stale: Vec<u8>,
    written: Vec<Vec<u8>>,
    timeout: Duration,
    timeouts_set: Vec<Duration>,
    flushes: usize,
    clears: usize,
    closed: bool,
}

impl MockBus {
    pub fn new() -> Self {
        Self {
            timeout: Duration::from_secs(2),
            ..Self::default()
        }
    }

    /// A bus whose every operation fails as if the port had gone away.
    pub fn closed() -> Self {
        Self {
            closed: true,
            ..Self::new()
        }
    }

    pub fn with_responses<I: IntoIterator<Item = Option<u8>>>(responses: I) -> Self {
        let mut bus = Self::new();
        bus.push_responses(responses);
        bus
    }

    pub fn push_response(&mut self, response: Option<u8>) {
        self.responses.push_back(response);
    }

    pub fn push_responses<I: IntoIterator<Item = Option<u8>>>(&mut self, responses: I) {
        self.responses.extend(responses);
    }

    /// Bytes left in the receive buffer before the next exchange.
    pub fn inject_stale(&mut self, bytes: &[u8]) {
        self.stale.extend_from_slice(bytes);
    }

    pub fn stale_len(&self) -> usize {
        self.stale.len()
    }

    pub fn close(&mut self) {
        self.closed = true;
    }

    /// Every `write_all` call, in order.
    pub fn writes(&self) -> &[Vec<u8>] {
        &self.written
    }

    /// All written bytes concatenated.
    pub fn written_bytes(&self) -> Vec<u8> {
        self.written.concat()
    }

    pub fn timeouts_set(&self) -> &[Duration] {
        &self.timeouts_set
    }

    pub fn flushes(&self) -> usize {
        self.flushes
    }

    pub fn clears(&self) -> usize {
        self.clears
    }

    pub fn remaining_responses(&self) -> usize {
        self.responses.len()
    }

    fn check_open(&self) -> Result<()> {
        if self.closed {
            Err(BusError::Closed)
        } else {
            Ok(())
        }
    }
}

impl Bus for MockBus {
    fn clear_input(&mut self) -> Result<()> {
        self.check_open()?;
        self.stale.clear();
        self.clears += 1;
        Ok(())
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        self.check_open()?;
        self.written.push(bytes.to_vec());
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.check_open()?;
        self.flushes += 1;
        Ok(())
    }

    fn read_byte(&mut self) -> Result<Option<u8>> {
        self.check_open()?;
        if !self.stale.is_empty() {
            return Ok(Some(self.stale.remove(0)));
        }
        Ok(self.responses.pop_front().flatten())
    }

    fn set_timeout(&mut self, timeout: Duration) -> Result<()> {
        self.check_open()?;
        self.timeout = timeout;
        self.timeouts_set.push(timeout);
        Ok(())
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }
}
