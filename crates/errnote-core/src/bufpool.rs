//! Reusable byte buffers for JSON encoding.
//!
//! Get/clear/put semantics over a bounded lock-free queue; callers borrow
//! a buffer as encode scratch and hand it back cleared. Overflow simply
//! drops the buffer.

use std::sync::OnceLock;

use crossbeam_queue::ArrayQueue;

const POOL_CAPACITY: usize = 16;

static POOL: OnceLock<ArrayQueue<Vec<u8>>> = OnceLock::new();

fn pool() -> &'static ArrayQueue<Vec<u8>> {
    POOL.get_or_init(|| ArrayQueue::new(POOL_CAPACITY))
}

pub(crate) fn get() -> Vec<u8> {
    pool().pop().unwrap_or_default()
}

pub(crate) fn put(mut buf: Vec<u8>) {
    buf.clear();
    let _ = pool().push(buf);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returned_buffers_come_back_cleared() {
        let mut buf = get();
        buf.extend_from_slice(b"scratch");
        put(buf);
        // Some buffer from the pool; whichever we get must be empty.
        assert!(get().is_empty());
    }
}
