use bytes::Bytes;
use std::io::{self, Cursor, Read};
use std::thread::JoinHandle;
use tokio::sync::mpsc;

// --- Constants ---

pub const NUM_READERS: usize = 5;
pub const READ_SIZE: usize = 4096;

// --- Channel Fan-Out Implementation ---

/// Baseline: one pump thread reads the source and sends every chunk to each consumer.
pub fn run_channel_fan_out<R>(mut source: R) -> (JoinHandle<()>, Vec<mpsc::Receiver<Bytes>>)
where
    R: Read + Send + 'static,
{
    let mut txs = Vec::new();
    let mut rxs = Vec::new();
    for _ in 0..NUM_READERS {
        let (tx, rx) = mpsc::channel(1024); // Buffered channel
        txs.push(tx);
        rxs.push(rx);
    }

    let pump = std::thread::spawn(move || {
        let mut buf = vec![0u8; READ_SIZE];
        loop {
            let n = match source.read(&mut buf) {
                Ok(0) | Err(_) => break,
                Ok(n) => n,
            };
            let chunk = Bytes::copy_from_slice(&buf[..n]);
            for tx in &txs {
                let _ = tx.blocking_send(chunk.clone());
            }
        }
    });
    (pump, rxs)
}

// --- Source Generators ---

// Source A: In-Memory (Minimal Read Latency)
pub fn generate_in_memory_source(len: usize) -> Cursor<Vec<u8>> {
    Cursor::new((0..len).map(|i| (i % 251) as u8).collect())
}

// Source B: Simulated I/O (short reads and a context switch per call)
pub struct SimulatedIoSource {
    inner: Cursor<Vec<u8>>,
}

impl Read for SimulatedIoSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        // Like a socket, hand out at most one small segment per call
        std::thread::yield_now();
        let len = buf.len().min(1500);
        self.inner.read(&mut buf[..len])
    }
}

pub fn generate_simulated_io_source(len: usize) -> SimulatedIoSource {
    SimulatedIoSource {
        inner: generate_in_memory_source(len),
    }
}
