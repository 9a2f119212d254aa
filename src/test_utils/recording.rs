use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::CandidateFile;
use crate::EvictionNotifier;
use crate::Result;
use crate::Transport;
use crate::TransportError;

/// Collects eviction notifications as `(storage_unit_id, file_id, version)`.
#[derive(Debug, Default)]
pub(crate) struct RecordingNotifier {
    notified: Mutex<Vec<(String, String, u32)>>,
}

impl RecordingNotifier {
    pub(crate) fn notified(&self) -> Vec<(String, String, u32)> {
        self.notified.lock().clone()
    }
}

impl EvictionNotifier for RecordingNotifier {
    fn notify_eligible_for_deletion(
        &self,
        storage_unit_id: &str,
        file_id: &str,
        file_version: u32,
    ) {
        self.notified
            .lock()
            .push((storage_unit_id.to_string(), file_id.to_string(), file_version));
    }
}

/// Transport that records every attempt and answers from a script.
///
/// Scripted answers are consumed in order; once the script is empty every
/// attempt succeeds.
#[derive(Debug, Default)]
pub(crate) struct ScriptedTransport {
    script: Mutex<VecDeque<bool>>,
    attempts: Mutex<Vec<(String, String)>>,
}

impl ScriptedTransport {
    pub(crate) fn failing_first(failures: usize) -> Self {
        let transport = Self::default();
        transport.script.lock().extend(std::iter::repeat(false).take(failures));
        transport
    }

    /// `(url, file_id)` of every attempt, in call order.
    pub(crate) fn attempts(&self) -> Vec<(String, String)> {
        self.attempts.lock().clone()
    }

    pub(crate) fn attempted_ids(&self) -> Vec<String> {
        self.attempts.lock().iter().map(|(_, id)| id.clone()).collect()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn deliver(
        &self,
        url: &str,
        file: &CandidateFile,
    ) -> Result<()> {
        self.attempts
            .lock()
            .push((url.to_string(), file.file_id.clone()));
        match self.script.lock().pop_front() {
            Some(false) => Err(TransportError::Rejected {
                url: url.to_string(),
                message: "scripted failure".to_string(),
            }
            .into()),
            _ => Ok(()),
        }
    }
}
