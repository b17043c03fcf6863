/// Send-side credit accounting for one channel.
///
/// Every chunk handed to the channel adds to the open send size until its
/// completion arrives. A chunk that pushes the open size over the limit has its
/// own completion parked in the window; it is released once enough earlier
/// chunks have been acknowledged to bring the open size back under the limit.
/// At most one completion can be parked at a time.
#[derive(Debug)]
pub struct WriteWindow<C> {
    open_send_size: usize,
    max_outstanding: usize,
    deferred: Option<C>,
}

impl<C> WriteWindow<C> {
    pub fn new(max_outstanding: usize) -> Self {
        Self {
            open_send_size: 0,
            max_outstanding,
            deferred: None,
        }
    }

    /// Account for a chunk of `len` bytes being sent.
    ///
    /// Returns true when the chunk's completion must be [deferred](Self::defer).
    pub fn begin(&mut self, len: usize) -> bool {
        self.open_send_size += len;
        self.open_send_size > self.max_outstanding
    }

    /// Park the completion of the chunk that overran the window.
    ///
    /// # Panics
    ///
    /// Panics if a completion is already parked. A writer must wait for its
    /// previous write to complete before issuing the next one.
    pub fn defer(&mut self, completion: C) {
        if self.deferred.is_some() {
            panic!("write issued while a previous write is still deferred");
        }
        self.deferred = Some(completion);
    }

    /// Account for the completion of a chunk of `len` bytes.
    ///
    /// Returns the parked completion once the open size is back under the limit.
    pub fn finish(&mut self, len: usize) -> Option<C> {
        debug_assert!(len <= self.open_send_size, "finished more than was sent");
        self.open_send_size = self.open_send_size.saturating_sub(len);
        if self.open_send_size <= self.max_outstanding {
            self.deferred.take()
        } else {
            None
        }
    }

    pub fn deferred_mut(&mut self) -> Option<&mut C> {
        self.deferred.as_mut()
    }

    pub fn take_deferred(&mut self) -> Option<C> {
        self.deferred.take()
    }

    pub fn open_send_size(&self) -> usize {
        self.open_send_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn under_limit_never_defers() {
        let mut window = WriteWindow::<&str>::new(64);
        assert!(!window.begin(32));
        assert!(!window.begin(32));
        assert_eq!(window.open_send_size(), 64);
        assert_eq!(window.finish(32), None);
        assert_eq!(window.finish(32), None);
        assert_eq!(window.open_send_size(), 0);
    }

    #[test]
    fn overrun_parks_until_back_under_limit() {
        let mut window = WriteWindow::new(64);
        assert!(!window.begin(40));
        assert!(!window.begin(20));
        assert!(window.begin(30));
        window.defer("third");
        assert!(window.deferred_mut().is_some());

        assert_eq!(window.finish(40), Some("third"));
        assert!(window.deferred_mut().is_none());
        assert_eq!(window.open_send_size(), 50);
    }

    #[test]
    fn stays_parked_while_over_limit() {
        let mut window = WriteWindow::new(10);
        assert!(window.begin(100));
        window.defer(1);
        assert!(window.begin(0));

        assert_eq!(window.finish(0), None);
        assert_eq!(window.finish(100), Some(1));
    }

    #[test]
    fn single_chunk_larger_than_limit_completes_on_its_own_ack() {
        let mut window = WriteWindow::new(64 * 1024);
        assert!(window.begin(128 * 1024));
        window.defer("big");
        assert_eq!(window.finish(128 * 1024), Some("big"));
        assert_eq!(window.open_send_size(), 0);
    }

    #[test]
    #[should_panic(expected = "still deferred")]
    fn second_deferral_panics() {
        let mut window = WriteWindow::new(1);
        assert!(window.begin(2));
        window.defer(1);
        assert!(window.begin(2));
        window.defer(2);
    }
}
