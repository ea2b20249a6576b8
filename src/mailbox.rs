use std::sync::{Arc, Mutex, MutexGuard};

/// A single-slot handoff between a transport callback and the frame update.
///
/// The callback side posts values at any time, possibly from another thread; the frame side
/// takes whatever is staged once per frame. Posting twice before a take keeps only what the
/// second post leaves in the slot, so a lag spike on one side never causes a burst of stale
/// work on the other.
///
/// Cloning a Mailbox gives another handle to the same slot.
#[derive(Debug)]
pub struct Mailbox<T> {
    slot: Arc<Mutex<Option<T>>>,
}

impl<T> Clone for Mailbox<T> {
    fn clone(&self) -> Self {
        Mailbox {
            slot: self.slot.clone(),
        }
    }
}

impl<T> Default for Mailbox<T> {
    fn default() -> Self {
        Mailbox {
            slot: Arc::new(Mutex::new(None)),
        }
    }
}

impl<T> Mailbox<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage a value, replacing anything not yet taken.
    pub fn post(&self, value: T) {
        *self.lock() = Some(value);
    }

    /// Edit the staged value in place, e.g. to merge a partial update into it.
    pub fn post_with<F>(&self, f: F)
    where
        F: FnOnce(&mut Option<T>),
    {
        f(&mut self.lock());
    }

    /// Take the staged value, leaving the slot empty.
    pub fn take(&self) -> Option<T> {
        self.lock().take()
    }

    // A panic inside post_with cannot leave the slot half-written, so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, Option<T>> {
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn latest_post_wins() {
        let mb = Mailbox::new();
        mb.post(1);
        mb.post(2);
        assert_eq!(mb.take(), Some(2));
        assert_eq!(mb.take(), None);
    }

    #[test]
    fn post_with_merges() {
        let mb: Mailbox<Vec<u32>> = Mailbox::new();
        mb.post_with(|slot| slot.get_or_insert_with(Vec::new).push(1));
        mb.post_with(|slot| slot.get_or_insert_with(Vec::new).push(2));
        assert_eq!(mb.take(), Some(vec![1, 2]));
    }

    #[test]
    fn posts_from_another_thread_are_seen() {
        let mb = Mailbox::new();
        let producer = mb.clone();

        thread::spawn(move || producer.post("hello"))
            .join()
            .unwrap();

        assert_eq!(mb.take(), Some("hello"));
    }
}
