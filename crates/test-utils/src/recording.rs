use std::sync::{Arc, Mutex};

use autobridge::errors::BridgeError;
use autobridge::output::{Delivery, ForegroundSink};

/// A foreground that records every delivery and progress fragment.
///
/// Clones share storage, so a test can keep one clone and hand the other to
/// a spawned execution.
#[derive(Debug, Clone, Default)]
pub struct RecordingForeground {
    deliveries: Arc<Mutex<Vec<Delivery>>>,
    progress: Arc<Mutex<Vec<String>>>,
    rejections: Arc<Mutex<Vec<String>>>,
}

impl RecordingForeground {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deliveries(&self) -> Vec<Delivery> {
        self.deliveries.lock().unwrap().clone()
    }

    /// Texts of all deliveries, in display order.
    pub fn texts(&self) -> Vec<String> {
        self.deliveries().into_iter().map(|d| d.text).collect()
    }

    pub fn last(&self) -> Option<Delivery> {
        self.deliveries.lock().unwrap().last().cloned()
    }

    pub fn progress(&self) -> Vec<String> {
        self.progress.lock().unwrap().clone()
    }

    /// Messages of the rejections the bridge reported.
    pub fn rejections(&self) -> Vec<String> {
        self.rejections.lock().unwrap().clone()
    }
}

impl ForegroundSink for RecordingForeground {
    fn display(&mut self, delivery: &Delivery) {
        self.deliveries.lock().unwrap().push(delivery.clone());
    }

    fn progress(&mut self, fragment: &str) {
        self.progress.lock().unwrap().push(fragment.to_string());
    }

    fn rejected(&mut self, reason: &BridgeError) {
        self.rejections.lock().unwrap().push(reason.to_string());
    }
}
