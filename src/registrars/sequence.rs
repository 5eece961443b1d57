//! Local identifier sequence
//!
//! Generates `<shoulder><6 base-36 chars>` identifiers from a counter kept
//! per `(protocol, authority, separator)` scope. Counters live behind a
//! `SequenceCounterStore`, so a durable store keeps them across runs.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::core::error::StorageError;
use crate::core::traits::{IdentifierSequence, SequenceCounterStore};

const WIDTH: usize = 6;
const ALPHABET: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Process-local counters, lost when the process exits
#[derive(Debug, Default)]
pub struct LocalSequenceCounters {
    counters: Mutex<HashMap<String, u64>>,
}

#[async_trait]
impl SequenceCounterStore for LocalSequenceCounters {
    async fn next_sequence_value(&self, scope: &str, start: u64) -> Result<u64, StorageError> {
        let mut counters = self.counters.lock().unwrap_or_else(PoisonError::into_inner);
        let counter = counters.entry(scope.to_string()).or_insert(start);
        let value = *counter;
        *counter += 1;
        Ok(value)
    }
}

pub struct SequenceIdentifierGenerator {
    shoulder: String,
    start: u64,
    counters: Arc<dyn SequenceCounterStore>,
}

impl SequenceIdentifierGenerator {
    /// Generator over process-local counters
    pub fn new(shoulder: impl Into<String>, start: u64) -> Self {
        Self::with_counters(shoulder, start, Arc::new(LocalSequenceCounters::default()))
    }

    pub fn with_counters(
        shoulder: impl Into<String>,
        start: u64,
        counters: Arc<dyn SequenceCounterStore>,
    ) -> Self {
        Self {
            shoulder: shoulder.into(),
            start,
            counters,
        }
    }
}

#[async_trait]
impl IdentifierSequence for SequenceIdentifierGenerator {
    async fn generate(
        &self,
        protocol: &str,
        authority: &str,
        separator: &str,
    ) -> Result<String, StorageError> {
        let scope = format!("{}:{}{}", protocol, authority, separator);
        let value = self.counters.next_sequence_value(&scope, self.start).await?;
        Ok(format!("{}{}", self.shoulder, base36(value)))
    }
}

/// Zero-padded base-36 rendering; wider than `WIDTH` once the counter overflows it
fn base36(mut value: u64) -> String {
    let mut digits = Vec::with_capacity(WIDTH);
    while value > 0 {
        digits.push(ALPHABET[(value % 36) as usize]);
        value /= 36;
    }
    while digits.len() < WIDTH {
        digits.push(b'0');
    }
    digits.reverse();
    String::from_utf8_lossy(&digits).into_owned()
}
