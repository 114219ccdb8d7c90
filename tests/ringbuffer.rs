use fsc2_ipc::Core::{LocalSegments, Mapping, SegmentBackend, SegmentId};
use fsc2_ipc::Queue::Buffer::{DataKind, QUEUE_SIZE};
use fsc2_ipc::Queue::{Consumer, Producer, QueueBuilder, StopReason};
use fsc2_ipc::IpcError;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn local_pair(budget: Duration) -> (Arc<LocalSegments>, Consumer, Producer) {
    let backend = Arc::new(LocalSegments::new());
    let consumer = QueueBuilder::new()
        .with_backend(backend.clone())
        .with_drain_budget(budget)
        .build_consumer()
        .unwrap();
    let producer = QueueBuilder::new()
        .with_backend(backend.clone())
        .build_producer(consumer.queue_id())
        .unwrap();
    (backend, consumer, producer)
}

fn collect_all(consumer: &Consumer) -> Vec<Vec<u8>> {
    let mut seen = Vec::new();
    consumer
        .dequeue_batch(true, |_, bytes| {
            seen.push(bytes.to_vec());
            Ok(())
        })
        .unwrap();
    seen
}

#[test]
fn entries_come_out_in_order() {
    let (backend, consumer, producer) = local_pair(Duration::from_millis(200));

    for i in 0..3u8 {
        producer.enqueue(DataKind::Data1d, &[i; 5]).unwrap();
    }
    assert_eq!(consumer.queue().in_flight(), 3);

    let report = consumer
        .dequeue_batch(false, |kind, bytes| {
            assert_eq!(kind, DataKind::Data1d);
            assert_eq!(bytes.len(), 5);
            Ok(())
        })
        .unwrap();
    assert_eq!(report.processed, 3);
    assert_eq!(report.stop, StopReason::Empty);
    assert!(consumer.queue().is_empty());

    // only the queue header is left
    assert_eq!(backend.live_segments(), 1);
}

#[test]
fn empty_payloads_are_delivered() {
    let (_backend, consumer, producer) = local_pair(Duration::from_millis(200));
    producer.enqueue(DataKind::Data2d, &[]).unwrap();
    assert_eq!(collect_all(&consumer), vec![Vec::<u8>::new()]);
}

#[test]
fn cursors_stay_in_range() {
    // with a 1ns budget every cycle handles exactly one entry
    let (_backend, consumer, producer) = local_pair(Duration::from_nanos(1));
    let mut rng = fastrand::Rng::with_seed(0x5eed);
    let queue = consumer.queue();

    for round in 0..400 {
        let free = QUEUE_SIZE - 1 - queue.in_flight();
        let n = rng.usize(0..=free.min(20));
        for _ in 0..n {
            producer.enqueue(DataKind::Data1d, &[round as u8]).unwrap();
        }

        let take = rng.usize(0..=queue.in_flight());
        for _ in 0..take {
            let report = consumer.dequeue_batch(false, |_, _| Ok(())).unwrap();
            assert_eq!(report.processed, 1);
        }

        assert!(queue.low() < QUEUE_SIZE);
        assert!(queue.high() < QUEUE_SIZE);
        assert!(queue.in_flight() <= QUEUE_SIZE - 1);
        assert_eq!(
            queue.available_slots().unwrap() as usize,
            QUEUE_SIZE - 1 - queue.in_flight()
        );
    }
}

#[test]
fn full_ring_blocks_the_producer() {
    let (_backend, consumer, producer) = local_pair(Duration::from_millis(200));
    for _ in 0..QUEUE_SIZE - 1 {
        producer.enqueue(DataKind::Data1d, b"x").unwrap();
    }
    assert_eq!(consumer.queue().in_flight(), QUEUE_SIZE - 1);
    assert_eq!(consumer.queue().available_slots().unwrap(), 0);

    let done = Arc::new(AtomicBool::new(false));
    let flag = done.clone();
    let handle = thread::spawn(move || {
        producer.enqueue(DataKind::Data1d, b"late").unwrap();
        flag.store(true, Ordering::Release);
        producer
    });

    thread::sleep(Duration::from_millis(100));
    assert!(!done.load(Ordering::Acquire), "enqueue must block on a full ring");
    assert_eq!(consumer.queue().in_flight(), QUEUE_SIZE - 1);

    let first = collect_all(&consumer);
    let _producer = handle.join().unwrap();
    assert!(done.load(Ordering::Acquire));

    let rest = collect_all(&consumer);
    let all: Vec<Vec<u8>> = first.into_iter().chain(rest).collect();
    assert_eq!(all.len(), QUEUE_SIZE);
    assert_eq!(all.last().unwrap(), b"late");
}

#[test]
fn drain_stops_at_request() {
    let (_backend, consumer, producer) = local_pair(Duration::from_millis(200));
    producer.enqueue(DataKind::Data1d, b"one").unwrap();
    producer.enqueue(DataKind::Data1d, b"two").unwrap();
    producer.request(b"answer me").unwrap();

    for drain_all in [false, true] {
        let report = consumer.dequeue_batch(drain_all, |_, _| Ok(())).unwrap();
        assert_eq!(report.stop, StopReason::Request);
    }
    assert_eq!(consumer.queue().low(), 2);
    assert_eq!(consumer.peek_kind().unwrap(), Some(DataKind::Request));

    assert_eq!(consumer.take_request().unwrap().as_deref(), Some(&b"answer me"[..]));
    assert!(consumer.queue().is_empty());
    assert_eq!(consumer.take_request().unwrap(), None);
}

#[test]
fn take_request_leaves_data_alone() {
    let (_backend, consumer, producer) = local_pair(Duration::from_millis(200));
    producer.enqueue(DataKind::Data2d, b"data").unwrap();
    assert_eq!(consumer.take_request().unwrap(), None);
    assert_eq!(consumer.queue().in_flight(), 1);
}

#[test]
fn budget_stops_between_entries_and_resumes() {
    let (_backend, consumer, producer) = local_pair(Duration::from_millis(30));
    for i in 0..12u8 {
        producer.enqueue(DataKind::Data1d, &[i]).unwrap();
    }

    let mut seen = Vec::new();
    let mut cycles = Vec::new();
    loop {
        let report = consumer
            .dequeue_batch(false, |_, bytes| {
                thread::sleep(Duration::from_millis(10));
                seen.push(bytes[0]);
                Ok(())
            })
            .unwrap();
        cycles.push(report);
        if report.stop == StopReason::Empty {
            break;
        }
    }

    assert_eq!(cycles[0].stop, StopReason::Budget);
    assert!(cycles[0].processed >= 1 && cycles[0].processed < 12);
    assert_eq!(seen, (0..12).collect::<Vec<u8>>());
}

#[test]
fn drain_all_ignores_the_budget() {
    let (_backend, consumer, producer) = local_pair(Duration::from_millis(5));
    for i in 0..6u8 {
        producer.enqueue(DataKind::Data1d, &[i]).unwrap();
    }
    let report = consumer
        .dequeue_batch(true, |_, _| {
            thread::sleep(Duration::from_millis(5));
            Ok(())
        })
        .unwrap();
    assert_eq!(report.processed, 6);
    assert_eq!(report.stop, StopReason::Empty);
}

#[test]
fn failing_handler_still_frees_the_entry() {
    let (backend, consumer, producer) = local_pair(Duration::from_millis(200));
    producer.enqueue(DataKind::Data1d, b"bad").unwrap();
    producer.enqueue(DataKind::Data1d, b"good").unwrap();

    let err = consumer
        .dequeue_batch(false, |_, _| Err(IpcError::UnknownType(99)))
        .unwrap_err();
    assert!(matches!(err, IpcError::UnknownType(99)));

    assert_eq!(consumer.queue().in_flight(), 1);
    assert_eq!(backend.live_segments(), 2);
    assert_eq!(collect_all(&consumer), vec![b"good".to_vec()]);
}

#[test]
fn kind_mismatch_between_slot_and_frame_is_fatal() {
    let (backend, consumer, producer) = local_pair(Duration::from_millis(200));

    // a 1D frame announced as 2D in the ring
    let (id, mapping) = backend.acquire(12).unwrap();
    let bytes = unsafe { mapping.as_mut_slice() };
    bytes[..8].copy_from_slice(&0i64.to_ne_bytes());
    bytes[8..12].copy_from_slice(&DataKind::Data1d.raw().to_ne_bytes());
    backend.release(mapping, None).unwrap();
    producer.queue().publish(id, DataKind::Data2d).unwrap();

    let err = consumer.dequeue_batch(false, |_, _| Ok(())).unwrap_err();
    assert!(matches!(err, IpcError::KindMismatch { slot: 2, frame: 1 }));
    assert!(consumer.queue().is_empty());
    assert_eq!(backend.live_segments(), 1);
}

#[test]
fn overlong_frame_is_fatal() {
    let (backend, consumer, producer) = local_pair(Duration::from_millis(200));

    let (id, mapping) = backend.acquire(16).unwrap();
    let bytes = unsafe { mapping.as_mut_slice() };
    bytes[..8].copy_from_slice(&1000i64.to_ne_bytes());
    bytes[8..12].copy_from_slice(&DataKind::Data1d.raw().to_ne_bytes());
    backend.release(mapping, None).unwrap();
    producer.queue().publish(id, DataKind::Data1d).unwrap();

    let err = consumer.dequeue_batch(false, |_, _| Ok(())).unwrap_err();
    assert!(matches!(err, IpcError::FrameOverrun { claimed: 1000, available: 4, .. }));
    assert_eq!(backend.live_segments(), 1);
}

#[test]
fn unknown_segment_in_the_ring_is_fatal() {
    let (_backend, consumer, producer) = local_pair(Duration::from_millis(200));
    producer.queue().publish(SegmentId(4242), DataKind::Data1d).unwrap();
    producer.enqueue(DataKind::Data1d, b"after").unwrap();

    let err = consumer.dequeue_batch(false, |_, _| Ok(())).unwrap_err();
    assert!(matches!(err, IpcError::Attach { id: SegmentId(4242), .. }));

    // the bad entry is gone, the next one is intact
    assert_eq!(collect_all(&consumer), vec![b"after".to_vec()]);
}

#[test]
fn dropping_the_consumer_removes_everything() {
    let (backend, consumer, producer) = local_pair(Duration::from_millis(200));
    for _ in 0..5 {
        producer.enqueue(DataKind::Data2d, b"pending").unwrap();
    }
    assert_eq!(backend.live_segments(), 6);

    drop(consumer);
    drop(producer);
    assert_eq!(backend.live_segments(), 0);
}

#[test]
fn producer_needs_an_initialised_queue() {
    let backend = Arc::new(LocalSegments::new());
    let (id, mapping) = backend.acquire(4096).unwrap();
    backend.release(mapping, None).unwrap();

    let err = QueueBuilder::new()
        .with_backend(backend.clone())
        .build_producer(id)
        .unwrap_err();
    assert!(matches!(err, IpcError::BadQueueMagic(_)));

    let err = QueueBuilder::new()
        .with_backend(backend)
        .build_producer(SegmentId::EMPTY)
        .unwrap_err();
    assert!(matches!(err, IpcError::Config(_)));
}

#[test]
fn zero_budget_is_rejected() {
    let err = QueueBuilder::new()
        .with_backend(Arc::new(LocalSegments::new()))
        .with_drain_budget(Duration::ZERO)
        .build_consumer()
        .unwrap_err();
    assert!(matches!(err, IpcError::Config(_)));
}

/// Local segments whose cleanup calls can be made to fail.
#[derive(Debug, Default)]
struct FaultyBackend {
    inner: LocalSegments,
    short_segments: AtomicBool,
    failing_cleanup: AtomicBool,
}

impl SegmentBackend for FaultyBackend {
    fn acquire(&self, size: usize) -> fsc2_ipc::Result<(SegmentId, Mapping)> {
        if self.short_segments.load(Ordering::Relaxed) {
            return self.inner.acquire(16);
        }
        self.inner.acquire(size)
    }

    fn attach(&self, id: SegmentId) -> fsc2_ipc::Result<Mapping> {
        self.inner.attach(id)
    }

    fn attach_mut(&self, id: SegmentId) -> fsc2_ipc::Result<Mapping> {
        self.inner.attach_mut(id)
    }

    fn release(&self, mapping: Mapping, id: Option<&mut SegmentId>) -> fsc2_ipc::Result<()> {
        if self.failing_cleanup.load(Ordering::Relaxed) {
            return Err(IpcError::Os {
                op: "shmdt",
                source: io::Error::from(io::ErrorKind::Other),
            });
        }
        self.inner.release(mapping, id)
    }

    fn destroy(&self, id: SegmentId) -> fsc2_ipc::Result<()> {
        if self.failing_cleanup.load(Ordering::Relaxed) {
            return Err(IpcError::UnknownSegment(id));
        }
        self.inner.destroy(id)
    }
}

#[test]
fn failed_enqueue_reports_the_detach_error() {
    let backend = Arc::new(FaultyBackend::default());
    let consumer = QueueBuilder::new()
        .with_backend(backend.clone())
        .build_consumer()
        .unwrap();
    let producer = QueueBuilder::new()
        .with_backend(backend.clone())
        .build_producer(consumer.queue_id())
        .unwrap();

    // detach fails first, removing the segment afterwards fails as well
    backend.failing_cleanup.store(true, Ordering::Relaxed);
    let err = producer.enqueue(DataKind::Data1d, b"lost").unwrap_err();
    assert!(matches!(err, IpcError::Os { op: "shmdt", .. }));
    assert!(consumer.queue().is_empty());

    backend.failing_cleanup.store(false, Ordering::Relaxed);
    producer.enqueue(DataKind::Data1d, b"next").unwrap();
    assert_eq!(collect_all(&consumer), vec![b"next".to_vec()]);
}

#[test]
fn short_header_segment_keeps_its_own_error() {
    let backend = Arc::new(FaultyBackend::default());
    backend.short_segments.store(true, Ordering::Relaxed);
    backend.failing_cleanup.store(true, Ordering::Relaxed);

    let err = QueueBuilder::new()
        .with_backend(backend.clone())
        .build_consumer()
        .unwrap_err();
    assert!(matches!(err, IpcError::Attach { .. }));

    backend.failing_cleanup.store(false, Ordering::Relaxed);
    let err = QueueBuilder::new()
        .with_backend(backend.clone())
        .build_consumer()
        .unwrap_err();
    assert!(matches!(err, IpcError::Attach { .. }));
    // the second header was removed again, the first one leaked with its failed cleanup
    assert_eq!(backend.inner.live_segments(), 1);
}
