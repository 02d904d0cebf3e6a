use crate::cooldown::CooldownGate;
use crate::event::NotificationEvent;
use crate::subjects::SubjectDirectory;
use crate::transport::{SendError, SendErrorKind, Transport};
use std::time::Instant;

/// What a call to [`Notifier::try_notify`] did.
#[derive(Debug, Clone, PartialEq)]
pub enum NotifyOutcome {
    /// The label has no subject id; nothing was sent.
    UnknownSubject,
    /// The subject is inside its cooldown window; nothing was sent.
    CoolingDown { subject_id: String },
    /// The endpoint accepted the event and a new window started.
    Sent { subject_id: String },
    /// Delivery failed; the event is dropped and the gate is untouched.
    Failed { subject_id: String, kind: SendErrorKind },
}

/// Turns recognized labels into attendance events.
///
/// Holds no cooldown state of its own; the caller owns the [`CooldownGate`]
/// and lends it for each attempt.
pub struct Notifier<T> {
    directory: SubjectDirectory,
    transport: T,
    location: String,
}

impl<T: Transport> Notifier<T> {
    pub fn new(directory: SubjectDirectory, transport: T, location: impl Into<String>) -> Self {
        Self {
            directory,
            transport,
            location: location.into(),
        }
    }

    /// Record a check-in for `label` unless it is unknown or cooling down.
    ///
    /// The gate is advanced to `now` only when the transport reports success.
    pub fn try_notify(
        &self,
        gate: &mut CooldownGate,
        label: &str,
        confidence: Option<f32>,
        now: Instant,
    ) -> NotifyOutcome {
        let Some(subject_id) = self.directory.resolve(label) else {
            tracing::warn!(label, "no subject id for recognized face; skipping attendance");
            return NotifyOutcome::UnknownSubject;
        };

        if gate.is_cooling_down(subject_id, now) {
            tracing::trace!(label, subject_id, "cooldown active");
            return NotifyOutcome::CoolingDown {
                subject_id: subject_id.to_string(),
            };
        }

        let event = NotificationEvent::check_in(subject_id, &self.location, confidence);
        match self.transport.send(&event) {
            Ok(()) => {
                gate.record(subject_id, now);
                tracing::info!(
                    label,
                    subject_id,
                    event_type = %event.event_type,
                    confidence = ?confidence,
                    at = %event.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    "attendance recorded"
                );
                NotifyOutcome::Sent {
                    subject_id: subject_id.to_string(),
                }
            }
            Err(err) => {
                log_send_failure(label, subject_id, &err);
                NotifyOutcome::Failed {
                    subject_id: subject_id.to_string(),
                    kind: err.kind(),
                }
            }
        }
    }
}

fn log_send_failure(label: &str, subject_id: &str, err: &SendError) {
    match err {
        SendError::Status { status, body } => {
            tracing::warn!(label, subject_id, status, body = %body, "HTTP error while sending attendance")
        }
        SendError::Connect(e) => {
            tracing::warn!(label, subject_id, error = %e, "connection error while sending attendance")
        }
        SendError::Timeout(e) => {
            tracing::warn!(label, subject_id, error = %e, "timeout while sending attendance")
        }
        SendError::Request(e) => {
            tracing::warn!(label, subject_id, error = %e, "request error while sending attendance")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::tests::{local_transport, serve_once};
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::time::Duration;

    /// Replays scripted results and records every event it was handed.
    #[derive(Default)]
    struct ScriptedTransport {
        replies: RefCell<VecDeque<Result<(), SendError>>>,
        sent: RefCell<Vec<NotificationEvent>>,
    }

    impl ScriptedTransport {
        fn replying(replies: Vec<Result<(), SendError>>) -> Self {
            Self {
                replies: RefCell::new(replies.into()),
                sent: RefCell::default(),
            }
        }

        fn calls(&self) -> usize {
            self.sent.borrow().len()
        }
    }

    impl Transport for &ScriptedTransport {
        fn send(&self, event: &NotificationEvent) -> Result<(), SendError> {
            self.sent.borrow_mut().push(event.clone());
            self.replies.borrow_mut().pop_front().unwrap_or(Ok(()))
        }
    }

    fn http_500() -> Result<(), SendError> {
        Err(SendError::Status {
            status: 500,
            body: r#"{"error":"boom"}"#.into(),
        })
    }

    fn notifier(transport: &ScriptedTransport) -> Notifier<&ScriptedTransport> {
        Notifier::new(SubjectDirectory::builtin().unwrap(), transport, "Main Entrance Camera")
    }

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    #[test]
    fn test_cooldown_scenario_0_100_301() {
        let transport = ScriptedTransport::default();
        let notifier = notifier(&transport);
        let mut gate = CooldownGate::default();
        let t0 = Instant::now();

        let sent = NotifyOutcome::Sent { subject_id: "7".into() };
        assert_eq!(notifier.try_notify(&mut gate, "DR. JOHN SMITH", Some(0.6), t0), sent);
        assert_eq!(
            notifier.try_notify(&mut gate, "DR. JOHN SMITH", Some(0.6), t0 + secs(100)),
            NotifyOutcome::CoolingDown { subject_id: "7".into() }
        );
        assert_eq!(notifier.try_notify(&mut gate, "DR. JOHN SMITH", Some(0.6), t0 + secs(301)), sent);

        assert_eq!(transport.calls(), 2);
        assert_eq!(gate.last_sent("7"), Some(t0 + secs(301)));
    }

    #[test]
    fn test_attempts_inside_window_never_send() {
        let transport = ScriptedTransport::default();
        let notifier = notifier(&transport);
        let mut gate = CooldownGate::default();
        let t0 = Instant::now();

        for offset in [0, 1, 60, 150, 299] {
            notifier.try_notify(&mut gate, "Dr. Sofia Khan", None, t0 + secs(offset));
        }
        assert_eq!(transport.calls(), 1);
        assert_eq!(gate.last_sent("3"), Some(t0));
    }

    #[test]
    fn test_failed_send_does_not_start_cooldown() {
        let transport = ScriptedTransport::replying(vec![http_500()]);
        let notifier = notifier(&transport);
        let mut gate = CooldownGate::default();
        let t0 = Instant::now();

        assert_eq!(
            notifier.try_notify(&mut gate, "DR. JOHN SMITH", Some(0.5), t0),
            NotifyOutcome::Failed { subject_id: "7".into(), kind: SendErrorKind::Status }
        );
        assert!(!gate.is_cooling_down("7", t0));
        assert_eq!(gate.last_sent("7"), None);

        assert_eq!(
            notifier.try_notify(&mut gate, "DR. JOHN SMITH", Some(0.5), t0 + secs(1)),
            NotifyOutcome::Sent { subject_id: "7".into() }
        );
        assert_eq!(transport.calls(), 2);
        assert_eq!(gate.last_sent("7"), Some(t0 + secs(1)));
    }

    #[test]
    fn test_every_failure_kind_leaves_gate_idle() {
        let connect_err = {
            // Any refused connection yields a real connect error.
            let port = std::net::TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port();
            let url = reqwest::Url::parse(&format!("http://127.0.0.1:{port}/")).unwrap();
            let transport = local_transport(url, secs(5));
            Transport::send(&transport, &NotificationEvent::check_in("1", "x", None)).unwrap_err()
        };
        assert_eq!(connect_err.kind(), SendErrorKind::Connect);

        let transport = ScriptedTransport::replying(vec![Err(connect_err), http_500()]);
        let notifier = notifier(&transport);
        let mut gate = CooldownGate::default();
        let t0 = Instant::now();

        assert!(matches!(
            notifier.try_notify(&mut gate, "Dr. Nasir Ali", None, t0),
            NotifyOutcome::Failed { kind: SendErrorKind::Connect, .. }
        ));
        assert!(matches!(
            notifier.try_notify(&mut gate, "Dr. Nasir Ali", None, t0),
            NotifyOutcome::Failed { kind: SendErrorKind::Status, .. }
        ));
        assert_eq!(gate.last_sent("5"), None);
    }

    #[test]
    fn test_unresolved_label_never_reaches_transport() {
        let transport = ScriptedTransport::default();
        let notifier = notifier(&transport);
        let mut gate = CooldownGate::default();
        let t0 = Instant::now();

        assert_eq!(
            notifier.try_notify(&mut gate, "Visitor", Some(0.9), t0),
            NotifyOutcome::UnknownSubject
        );
        assert_eq!(
            notifier.try_notify(&mut gate, "UNKNOWN", None, t0),
            NotifyOutcome::UnknownSubject
        );
        assert_eq!(transport.calls(), 0);
    }

    #[test]
    fn test_event_contents() {
        let transport = ScriptedTransport::default();
        let notifier = notifier(&transport);
        let mut gate = CooldownGate::default();

        notifier.try_notify(&mut gate, "dr. emily white", Some(0.42), Instant::now());

        let sent = transport.sent.borrow();
        assert_eq!(sent[0].subject_id, "6");
        assert_eq!(sent[0].location, "Main Entrance Camera");
        assert_eq!(sent[0].confidence, Some(0.42));
        assert_eq!(sent[0].event_type.to_string(), "Check-in");
    }

    #[test]
    fn test_subjects_cool_down_independently() {
        let transport = ScriptedTransport::default();
        let notifier = notifier(&transport);
        let mut gate = CooldownGate::default();
        let t0 = Instant::now();

        notifier.try_notify(&mut gate, "DR. JOHN SMITH", None, t0);
        let other = notifier.try_notify(&mut gate, "DR. SARAH CHEN", None, t0 + secs(1));
        assert_eq!(other, NotifyOutcome::Sent { subject_id: "8".into() });
        assert_eq!(transport.calls(), 2);
    }

    #[test]
    fn test_http_500_end_to_end_keeps_gate_idle() {
        let (url, server) = serve_once("500 Internal Server Error", r#"{"error":"insert failed"}"#);
        let notifier = Notifier::new(
            SubjectDirectory::builtin().unwrap(),
            local_transport(url, secs(5)),
            "Main Entrance Camera",
        );
        let mut gate = CooldownGate::default();
        let t0 = Instant::now();

        let outcome = notifier.try_notify(&mut gate, "DR. JOHN SMITH", Some(0.7), t0);
        server.join().unwrap();

        assert_eq!(outcome, NotifyOutcome::Failed { subject_id: "7".into(), kind: SendErrorKind::Status });
        assert!(!gate.is_cooling_down("7", t0 + secs(1)));

        let (url, server) = serve_once("200 OK", "{}");
        let notifier = Notifier::new(
            SubjectDirectory::builtin().unwrap(),
            local_transport(url, secs(5)),
            "Main Entrance Camera",
        );
        let retry = notifier.try_notify(&mut gate, "DR. JOHN SMITH", Some(0.7), t0 + secs(1));
        let req = server.join().unwrap();

        assert_eq!(retry, NotifyOutcome::Sent { subject_id: "7".into() });
        assert!(req.body.contains(r#""doctor_id":"7""#));
    }
}
