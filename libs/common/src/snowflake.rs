use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

/// Custom epoch: 2024-01-01T00:00:00Z in milliseconds since Unix epoch.
const LAGOON_EPOCH_MS: u64 = 1_704_067_200_000;

const WORKER_BITS: u64 = 10;
const SEQ_BITS: u64 = 12;
const SEQ_MASK: u64 = (1 << SEQ_BITS) - 1;

/// 64-bit time-ordered ID generator for stored messages.
///
/// Bit layout (MSB → LSB): 42-bit millisecond timestamp since the Lagoon
/// epoch, 10-bit worker id, 12-bit per-millisecond sequence.
pub struct SnowflakeGenerator {
    worker_id: u64,
    state: Mutex<Clock>,
}

struct Clock {
    last_ms: u64,
    seq: u64,
}

impl SnowflakeGenerator {
    pub fn new(worker_id: u16) -> Self {
        assert!(
            (worker_id as u64) < (1 << WORKER_BITS),
            "worker_id must fit in {WORKER_BITS} bits"
        );
        Self {
            worker_id: worker_id as u64,
            state: Mutex::new(Clock { last_ms: 0, seq: 0 }),
        }
    }

    pub fn generate(&self) -> i64 {
        let mut clock = self.state.lock().unwrap();

        let mut now = now_ms();
        if now < clock.last_ms {
            panic!("clock moved backwards: {} -> {}", clock.last_ms, now);
        }

        if now == clock.last_ms {
            clock.seq = (clock.seq + 1) & SEQ_MASK;
            if clock.seq == 0 {
                // Sequence exhausted for this millisecond; wait out the tick.
                while now == clock.last_ms {
                    now = now_ms();
                }
            }
        } else {
            clock.seq = 0;
        }
        clock.last_ms = now;

        let ts = now - LAGOON_EPOCH_MS;
        ((ts << (WORKER_BITS + SEQ_BITS)) | (self.worker_id << SEQ_BITS) | clock.seq) as i64
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock before Unix epoch")
        .as_millis() as u64
}

/// Extract the creation timestamp (ms since Unix epoch) from a generated id.
pub fn timestamp_ms(id: i64) -> u64 {
    ((id as u64) >> (WORKER_BITS + SEQ_BITS)) + LAGOON_EPOCH_MS
}
