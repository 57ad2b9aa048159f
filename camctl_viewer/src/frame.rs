/// Routes inbound frame payloads to the display surface. Only the most
/// recent payload matters: nothing is queued, and a sequenced frame older
/// than the newest one seen is dropped as stale. Unsequenced frames keep the
/// original last-write-wins behavior.
#[derive(Debug, Default)]
pub struct FrameSink {
    latest: Option<String>,
    last_seq: Option<u64>,
    accepted: u64,
    dropped_stale: u64,
}

impl FrameSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the image reference the surface should now show, or None if
    /// the payload arrived out of order and was discarded.
    pub fn accept(&mut self, frame: String, seq: Option<u64>) -> Option<&str> {
        if let (Some(seq), Some(last)) = (seq, self.last_seq) {
            if seq < last {
                self.dropped_stale += 1;
                return None;
            }
        }
        if seq.is_some() {
            self.last_seq = seq;
        }
        self.accepted += 1;
        self.latest = Some(frame);
        self.latest.as_deref()
    }

    pub fn latest(&self) -> Option<&str> {
        self.latest.as_deref()
    }

    pub fn accepted(&self) -> u64 {
        self.accepted
    }

    pub fn dropped_stale(&self) -> u64 {
        self.dropped_stale
    }

    /// Forget the per-connection sequence watermark. Called on reconnect:
    /// the server restarts its numbering with the new frame-push loop.
    pub fn reset_sequence(&mut self) {
        self.last_seq = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn each_payload_supersedes_the_previous_one() {
        let mut sink = FrameSink::new();
        assert_eq!(sink.accept("frame-1".to_string(), None), Some("frame-1"));
        assert_eq!(sink.accept("frame-2".to_string(), None), Some("frame-2"));
        assert_eq!(sink.latest(), Some("frame-2"));
        assert_eq!(sink.accepted(), 2);
    }

    #[test]
    fn stale_sequenced_frames_are_dropped() {
        let mut sink = FrameSink::new();
        assert!(sink.accept("frame-5".to_string(), Some(5)).is_some());
        assert_eq!(sink.accept("frame-3".to_string(), Some(3)), None);
        assert_eq!(sink.latest(), Some("frame-5"));
        assert_eq!(sink.dropped_stale(), 1);

        assert!(sink.accept("frame-6".to_string(), Some(6)).is_some());
        assert_eq!(sink.latest(), Some("frame-6"));
    }

    #[test]
    fn unsequenced_payloads_always_replace() {
        let mut sink = FrameSink::new();
        assert!(sink.accept("frame-9".to_string(), Some(9)).is_some());
        // A legacy server without sequence numbers still wins.
        assert_eq!(sink.accept("frame-x".to_string(), None), Some("frame-x"));
    }

    #[test]
    fn sequence_watermark_clears_on_reset() {
        let mut sink = FrameSink::new();
        assert!(sink.accept("frame-9".to_string(), Some(9)).is_some());
        sink.reset_sequence();
        assert_eq!(sink.accept("frame-1".to_string(), Some(1)), Some("frame-1"));
    }
}
