//! Coalescing request queue
//!
//! Requests are passed to the worker over an unbounded channel, so the
//! producer never blocks.  Alongside the channel the queue keeps a single
//! atomic marker recording the serial number and centre of the most recently
//! submitted request.  The worker compares each request it dequeues against
//! this marker to decide whether the request is still worth computing.
use std::{
    fmt,
    sync::{
        atomic::{AtomicU32, AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use crossbeam_channel::{
    bounded, unbounded, Receiver, RecvTimeoutError, Sender, TryRecvError,
};

use crate::{base::Pos, error::TrackError, filter::ReadClassFilter, window::CoverageWindow};

/// What a request receives: the window it can read its interval from, or
/// the reason there is none
pub type Reply = Result<Arc<CoverageWindow>, TrackError>;

/// Called at most once.  Never called for a request that is dropped
pub type ReplyFn = Box<dyn FnOnce(Reply) + Send>;

/// IntervalRequest
///
/// A request for coverage over [from, to] (1-based, inclusive) using filter.
/// The serial number is assigned when the request is enqueued
pub struct IntervalRequest {
    from: Pos,
    to: Pos,
    filter: ReadClassFilter,
    reply_to: ReplyFn,
    serial: u32,
}

impl IntervalRequest {
    pub fn new<F>(from: Pos, to: Pos, filter: ReadClassFilter, f: F) -> Self
    where
        F: FnOnce(Reply) + Send + 'static,
    {
        Self {
            from,
            to,
            filter,
            reply_to: Box::new(f),
            serial: 0,
        }
    }

    /// Request whose reply is sent down a channel.  If the request is dropped
    /// without being answered the receiver sees the channel disconnect
    pub fn with_channel(from: Pos, to: Pos, filter: ReadClassFilter) -> (Self, Receiver<Reply>) {
        let (s, r) = bounded(1);
        let req = Self::new(from, to, filter, move |reply| {
            // Nobody waiting for the answer is not an error
            let _ = s.send(reply);
        });
        (req, r)
    }

    pub fn from(&self) -> Pos {
        self.from
    }

    pub fn to(&self) -> Pos {
        self.to
    }

    pub fn filter(&self) -> &ReadClassFilter {
        &self.filter
    }

    /// Midpoint of the interval, rounded down
    pub fn center(&self) -> Pos {
        self.from + (self.to - self.from) / 2
    }

    /// 0 until the request has been enqueued
    pub fn serial(&self) -> u32 {
        self.serial
    }

    pub(crate) fn reply(self, reply: Reply) {
        (self.reply_to)(reply)
    }
}

impl fmt::Debug for IntervalRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "IntervalRequest(#{} {}-{} centre {}, {})",
            self.serial,
            self.from,
            self.to,
            self.center(),
            self.filter
        )
    }
}

/// Serial number and centre of the most recent request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Latest {
    pub serial: u32,
    pub center: Pos,
}

/// True if serial a was assigned after serial b, allowing for wrap around
fn serial_after(a: u32, b: u32) -> bool {
    (a.wrapping_sub(b) as i32) > 0
}

/// Single word holding (serial << 32 | centre), so both are always
/// replaced together.  0 means nothing has been submitted.  The marker only
/// moves forward: with several submitting threads, a request that lost the
/// race to the marker can not overwrite a later one
#[derive(Debug, Default)]
struct LatestMarker(AtomicU64);

impl LatestMarker {
    fn advance(&self, l: Latest) {
        let new = ((l.serial as u64) << 32) | l.center as u64;
        let mut cur = self.0.load(Ordering::Acquire);
        loop {
            if cur != 0 && !serial_after(l.serial, (cur >> 32) as u32) {
                return;
            }
            match self
                .0
                .compare_exchange_weak(cur, new, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return,
                Err(x) => cur = x,
            }
        }
    }

    fn load(&self) -> Option<Latest> {
        match self.0.load(Ordering::Acquire) {
            0 => None,
            x => Some(Latest {
                serial: (x >> 32) as u32,
                center: x as u32,
            }),
        }
    }
}

/// Result of polling the queue
#[derive(Debug)]
pub enum Poll {
    Ready(IntervalRequest),
    Empty,
    /// All senders have gone and the queue is drained
    Disconnected,
}

/// Create a connected pair of queue ends
pub fn request_queue() -> (RequestSender, RequestReceiver) {
    let (s, r) = unbounded();
    let latest = Arc::new(LatestMarker::default());
    (
        RequestSender {
            send: s,
            latest: Arc::clone(&latest),
            next_serial: AtomicU32::new(0),
        },
        RequestReceiver { recv: r, latest },
    )
}

/// Producer end of the queue
pub struct RequestSender {
    send: Sender<IntervalRequest>,
    latest: Arc<LatestMarker>,
    next_serial: AtomicU32,
}

impl RequestSender {
    /// Append r and make it the latest request.  Never blocks.  Fails only if
    /// the receiving end has gone, in which case the request is handed back
    pub fn enqueue(&self, mut r: IntervalRequest) -> Result<u32, IntervalRequest> {
        // Serial numbers start at 1 and skip 0 on wrap around
        let mut serial = self.next_serial.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
        if serial == 0 {
            serial = self.next_serial.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
        }
        r.serial = serial;
        let center = r.center();

        // The marker must be visible before the request can be dequeued
        self.latest.advance(Latest { serial, center });
        self.send.send(r).map_err(|e| e.into_inner())?;
        Ok(serial)
    }

    pub fn latest(&self) -> Option<Latest> {
        self.latest.load()
    }
}

/// Consumer end of the queue
pub struct RequestReceiver {
    recv: Receiver<IntervalRequest>,
    latest: Arc<LatestMarker>,
}

impl RequestReceiver {
    /// FIFO pop without waiting
    pub fn dequeue(&self) -> Poll {
        match self.recv.try_recv() {
            Ok(r) => Poll::Ready(r),
            Err(TryRecvError::Empty) => Poll::Empty,
            Err(TryRecvError::Disconnected) => Poll::Disconnected,
        }
    }

    /// FIFO pop, waiting at most d for a request to arrive
    pub fn dequeue_timeout(&self, d: Duration) -> Poll {
        match self.recv.recv_timeout(d) {
            Ok(r) => Poll::Ready(r),
            Err(RecvTimeoutError::Timeout) => Poll::Empty,
            Err(RecvTimeoutError::Disconnected) => Poll::Disconnected,
        }
    }

    pub fn latest(&self) -> Option<Latest> {
        self.latest.load()
    }

    /// Number of requests waiting
    pub fn len(&self) -> usize {
        self.recv.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recv.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(from: Pos, to: Pos) -> IntervalRequest {
        IntervalRequest::new(from, to, ReadClassFilter::default(), |_| {})
    }

    #[test]
    fn centre_rounds_down() {
        assert_eq!(req(100, 200).center(), 150);
        assert_eq!(req(100, 201).center(), 150);
        assert_eq!(req(7, 7).center(), 7);
        assert_eq!(req(u32::MAX - 1, u32::MAX).center(), u32::MAX - 1);
    }

    #[test]
    fn fifo_with_latest_marker() {
        let (s, r) = request_queue();
        assert!(r.latest().is_none());
        assert!(matches!(r.dequeue(), Poll::Empty));

        assert_eq!(s.enqueue(req(900, 1100)).unwrap(), 1);
        assert_eq!(s.enqueue(req(901, 1101)).unwrap(), 2);
        assert_eq!(s.enqueue(req(902, 1102)).unwrap(), 3);
        assert_eq!(r.len(), 3);
        assert_eq!(
            r.latest(),
            Some(Latest {
                serial: 3,
                center: 1002
            })
        );

        let order: Vec<_> = std::iter::from_fn(|| match r.dequeue() {
            Poll::Ready(x) => Some((x.serial(), x.center())),
            _ => None,
        })
        .collect();
        assert_eq!(order, vec![(1, 1000), (2, 1001), (3, 1002)]);
        // Dequeuing does not change the marker
        assert_eq!(r.latest().map(|l| l.serial), Some(3));
    }

    #[test]
    fn disconnect() {
        let (s, r) = request_queue();
        s.enqueue(req(1, 10)).unwrap();
        drop(s);
        // Queued requests are still delivered before disconnection is seen
        assert!(matches!(r.dequeue(), Poll::Ready(_)));
        assert!(matches!(
            r.dequeue_timeout(Duration::from_millis(1)),
            Poll::Disconnected
        ));

        let (s, r) = request_queue();
        drop(r);
        assert!(s.enqueue(req(1, 10)).is_err());
    }

    #[test]
    fn channel_reply() {
        let (rq, rx) = IntervalRequest::with_channel(10, 20, ReadClassFilter::default());
        rq.reply(Err(TrackError::TrackClosed(crate::track::TrackId(1))));
        assert!(matches!(rx.recv(), Ok(Err(TrackError::TrackClosed(_)))));

        // Dropped without reply
        let (rq, rx) = IntervalRequest::with_channel(10, 20, ReadClassFilter::default());
        drop(rq);
        assert!(rx.recv().is_err());
    }

    #[test]
    fn marker_only_moves_forward() {
        let m = LatestMarker::default();
        m.advance(Latest {
            serial: 5,
            center: 500,
        });
        m.advance(Latest {
            serial: 3,
            center: 300,
        });
        assert_eq!(
            m.load(),
            Some(Latest {
                serial: 5,
                center: 500
            })
        );

        // Serial 1 follows u32::MAX once the counter wraps
        m.advance(Latest {
            serial: u32::MAX,
            center: 10,
        });
        m.advance(Latest {
            serial: 1,
            center: 20,
        });
        assert_eq!(m.load().map(|l| l.serial), Some(1));
        m.advance(Latest {
            serial: u32::MAX - 2,
            center: 30,
        });
        assert_eq!(m.load().map(|l| (l.serial, l.center)), Some((1, 20)));
    }

    #[test]
    fn concurrent_submitters_leave_latest() {
        let (s, r) = request_queue();
        let n_threads = 4;
        let per_thread = 500;
        std::thread::scope(|sc| {
            for t in 0..n_threads {
                let s = &s;
                sc.spawn(move || {
                    for i in 0..per_thread {
                        let from = 1 + t * 10_000 + i;
                        s.enqueue(req(from, from + 100)).unwrap();
                    }
                });
            }
        });
        let total = n_threads * per_thread;
        assert_eq!(r.len(), total as usize);
        assert_eq!(r.latest().map(|l| l.serial), Some(total));

        // The marker centre belongs to the request with the highest serial
        let mut last = None;
        while let Poll::Ready(x) = r.dequeue() {
            if x.serial() == total {
                last = Some(x.center())
            }
        }
        assert_eq!(r.latest().map(|l| l.center), last);
    }
}
