//! Bounded trailing capture of process output.

/// Keeps at most `cap` bytes of the most recent output.
///
/// Oldest bytes are dropped first. A cut never lands inside a UTF-8
/// sequence, so the retained text may be a few bytes shorter than `cap`.
#[derive(Debug, Clone)]
pub struct TailBuffer {
    buf: String,
    cap: usize,
}

impl TailBuffer {
    pub fn new(cap: usize) -> Self {
        Self {
            buf: String::new(),
            cap,
        }
    }

    pub fn push(&mut self, chunk: &str) {
        self.buf.push_str(chunk);
        if self.buf.len() > self.cap {
            let mut cut = self.buf.len() - self.cap;
            while !self.buf.is_char_boundary(cut) {
                cut += 1;
            }
            self.buf.drain(..cut);
        }
    }

    pub fn as_str(&self) -> &str {
        &self.buf
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn cap(&self) -> usize {
        self.cap
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_everything_under_cap() {
        let mut tail = TailBuffer::new(16);
        tail.push("hello ");
        tail.push("world");
        assert_eq!(tail.as_str(), "hello world");
    }

    #[test]
    fn drops_oldest_bytes_over_cap() {
        let mut tail = TailBuffer::new(10);
        for i in 0..100 {
            tail.push(&format!("{i},"));
            assert!(tail.len() <= 10);
        }
        assert!(tail.as_str().ends_with("98,99,"));
    }

    #[test]
    fn single_chunk_larger_than_cap() {
        let mut tail = TailBuffer::new(4);
        tail.push("abcdefgh");
        assert_eq!(tail.as_str(), "efgh");
    }

    #[test]
    fn never_splits_a_multibyte_char() {
        let mut tail = TailBuffer::new(5);
        tail.push("ééé");
        // 6 bytes; cutting one byte would split the first 'é'
        assert_eq!(tail.as_str(), "éé");
        assert!(tail.len() <= tail.cap());
    }
}
