use laser_job::Point;
use laser_job::stream::{
    Effect, InboundEvent, JobEvent, JobOutcome, JobState, Realtime, Streamer, TcpLink, WINDOW,
};
use proptest::prelude::*;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

fn program(n: usize) -> String {
    (0..n).map(|i| format!("G1 X{} Y0\n", i)).collect()
}

fn sent(effects: &[Effect]) -> usize {
    effects
        .iter()
        .filter(|e| matches!(e, Effect::Send(_)))
        .count()
}

#[test]
fn test_job_runs_to_completion() {
    let mut s = Streamer::new();
    let mut total_sent = sent(&s.handle(JobEvent::Start(program(7))));
    assert_eq!(total_sent, 3);

    let mut last = Vec::new();
    for _ in 0..7 {
        last = s.handle(JobEvent::Ack);
        total_sent += sent(&last);
    }
    assert_eq!(total_sent, 7);
    assert_eq!(
        last,
        vec![
            Effect::Progress { done: 7, total: 7 },
            Effect::Completed
        ]
    );
    assert_eq!(s.state(), JobState::Idle);
}

#[test]
fn test_abort_discards_and_ignores_late_acks() {
    let mut s = Streamer::new();
    s.handle(JobEvent::Start(program(10)));
    let effects = s.handle(JobEvent::Abort);
    assert_eq!(
        effects,
        vec![Effect::Realtime(Realtime::Reset), Effect::Aborted]
    );
    assert_eq!(s.state(), JobState::Idle);
    assert_eq!(s.in_flight(), 0);
    assert!(s.pending().is_empty());

    for _ in 0..3 {
        assert!(s.handle(JobEvent::Ack).is_empty());
    }
    assert_eq!(s, Streamer::new());
}

#[test]
fn test_abort_while_paused() {
    let mut s = Streamer::new();
    s.handle(JobEvent::Start(program(5)));
    s.handle(JobEvent::Pause);
    s.handle(JobEvent::Abort);
    assert_eq!(s.state(), JobState::Idle);
    assert!(s.pending().is_empty());
}

#[test]
fn test_start_while_running_is_ignored() {
    let mut s = Streamer::new();
    s.handle(JobEvent::Start(program(5)));
    assert!(s.handle(JobEvent::Start(program(2))).is_empty());
    assert_eq!(s.total(), 5);
}

#[test]
fn test_start_while_paused_resumes_and_refills() {
    let mut s = Streamer::new();
    s.handle(JobEvent::Start(program(6)));
    s.handle(JobEvent::Pause);
    s.handle(JobEvent::Ack);

    let effects = s.handle(JobEvent::Start(program(1)));
    assert_eq!(effects[0], Effect::Realtime(Realtime::Resume));
    assert_eq!(sent(&effects), 1);
    assert_eq!(s.state(), JobState::Running);
    assert_eq!(s.in_flight(), WINDOW);
    assert_eq!(s.total(), 6);
}

fn arb_event() -> impl Strategy<Value = JobEvent> {
    prop_oneof![
        6 => Just(JobEvent::Ack),
        2 => Just(JobEvent::Poll),
        1 => Just(JobEvent::Pause),
        1 => Just(JobEvent::Resume),
        1 => Just(JobEvent::Abort),
        1 => (0usize..8).prop_map(|n| JobEvent::Start(program(n))),
    ]
}

proptest! {
    #[test]
    fn prop_window_never_exceeded(events in prop::collection::vec(arb_event(), 0..60)) {
        let mut s = Streamer::new();
        for event in events {
            let was_abort = event == JobEvent::Abort;
            let (next, effects) = s.step(event);
            s = next;
            prop_assert!(s.in_flight() <= WINDOW);
            prop_assert!(sent(&effects) <= WINDOW);
            prop_assert!(s.done() <= s.total());
            if was_abort || s.state() == JobState::Idle {
                prop_assert_eq!(s.in_flight(), 0);
                prop_assert!(s.pending().is_empty());
            }
            if s.state() == JobState::Paused {
                prop_assert_eq!(sent(&effects), 0);
            }
        }
    }
}

/// Fake controller: acks every line it reads, returns the lines
async fn ack_all(stream: TcpStream) -> Vec<String> {
    let (read, mut write) = stream.into_split();
    let mut lines = BufReader::new(read).lines();
    let mut seen = Vec::new();
    write.write_all(b"Grbl 1.1h ['$' for help]\r\n").await.unwrap();
    while let Ok(Some(line)) = lines.next_line().await {
        seen.push(line);
        write.write_all(b"<Run|MPos:1.000,2.000,0.000|FS:600,0>\r\nok\r\n").await.unwrap();
    }
    seen
}

#[tokio::test]
async fn test_streams_program_over_tcp() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let controller = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        ack_all(stream).await
    });

    let (events, mut inbound) = mpsc::unbounded_channel();
    let mut link = TcpLink::connect(&addr, events)
        .await
        .unwrap()
        .with_status_interval(None);
    let (_controls, rx) = mpsc::unbounded_channel();
    let gcode = format!("; header\n{}", program(8));
    let outcome = link.run_job(&gcode, rx).await.unwrap();
    assert_eq!(outcome, JobOutcome::Completed);
    drop(link);

    let seen = controller.await.unwrap();
    assert_eq!(seen.len(), 8);
    assert_eq!(seen[0], "G1 X0 Y0");
    assert_eq!(seen[7], "G1 X7 Y0");

    let mut reported = Vec::new();
    while let Ok(event) = inbound.try_recv() {
        reported.push(event);
    }
    assert_eq!(reported[0], InboundEvent::Connected);
    assert!(reported.contains(&InboundEvent::Position(Point::new(1.0, 2.0))));
    assert_eq!(
        reported
            .iter()
            .filter(|e| **e == InboundEvent::Ack)
            .count(),
        8
    );
}

#[tokio::test]
async fn test_abort_over_tcp() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let controller = tokio::spawn(async move {
        // Never acks, so the job stays running until aborted
        let (stream, _) = listener.accept().await.unwrap();
        let mut bytes = Vec::new();
        let (read, _write) = stream.into_split();
        let mut reader = BufReader::new(read);
        while let Ok(n) = reader.read_until(0x18, &mut bytes).await {
            if n == 0 || bytes.last() == Some(&0x18) {
                break;
            }
        }
        bytes
    });

    let (events, _inbound) = mpsc::unbounded_channel();
    let mut link = TcpLink::connect(&addr, events)
        .await
        .unwrap()
        .with_status_interval(None);
    let (controls, rx) = mpsc::unbounded_channel();
    controls.send(JobEvent::Abort).unwrap();
    let outcome = link.run_job(&program(10), rx).await.unwrap();
    assert_eq!(outcome, JobOutcome::Aborted);
    drop(link);

    let bytes = controller.await.unwrap();
    assert_eq!(bytes.last(), Some(&0x18));
    let text = String::from_utf8_lossy(&bytes[..bytes.len() - 1]).to_string();
    assert_eq!(text.lines().count(), WINDOW);
}
