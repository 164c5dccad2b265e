//! Session control: the state machine gating acquisition.
//!
//! A [`SessionController`] owns one pair of rolling buffers (the dual-axis
//! EDA + heart-rate chart and the phasic/tonic decomposition chart) and one
//! event timeline. Incoming samples reach the buffers only while the session
//! is `Recording`; marker insertion is likewise gated. Illegal transitions are
//! rejected with the state unchanged, never a panic.
//!
//! Lifecycle:
//!
//! ```text
//! DISCONNECTED -> CONNECTED -> ARMED <-> RECORDING <-> PAUSED -> STOPPED
//! ```
//!
//! Disconnecting the device forces `Disconnected` from any state. `Stopped`
//! is terminal per session instance: a new session goes through
//! `Connected -> Armed` again and arming recreates buffers and timeline, so
//! nothing leaks between sessions.
//!
//! Registered [`SessionObserver`]s are invoked synchronously on whichever
//! thread drives the controller; the acquisition loop guarantees that is the
//! tick/control domain, never the device-notification thread.

use chrono::{DateTime, Utc};

use crate::buffer::{BufferWindow, RollingBuffer};
use crate::clock::Sample;
use crate::error::{BufferError, SessionError};
use crate::timeline::{EventTimeline, Marker, MarkerId};

/// Session lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connected,
    Armed,
    Recording,
    Paused,
    Stopped,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            SessionState::Disconnected => "DISCONNECTED",
            SessionState::Connected => "CONNECTED",
            SessionState::Armed => "ARMED",
            SessionState::Recording => "RECORDING",
            SessionState::Paused => "PAUSED",
            SessionState::Stopped => "STOPPED",
        };
        f.write_str(label)
    }
}

/// Output of the external EDA decomposition collaborator for one sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decomposition {
    /// Conditioned EDA signal, µS.
    pub clean: f64,
    /// Fast-varying skin conductance response component.
    pub phasic: f64,
    /// Slow-drifting baseline level.
    pub tonic: f64,
}

/// External collaborator that splits EDA into phasic and tonic components.
/// The engine consumes its output; it never reimplements the algorithm.
pub trait EdaDecomposer: Send {
    fn decompose(&mut self, timestamp: f64, eda_microsiemens: f64) -> Decomposition;
}

/// Minimal stand-in decomposer: an exponential moving baseline as the tonic
/// level, the residual as the phasic driver. Good enough for the simulated
/// path and for tests; a real deployment plugs in its own collaborator.
pub struct BaselineDecomposer {
    alpha: f64,
    tonic: Option<f64>,
}

impl BaselineDecomposer {
    pub fn new(alpha: f64) -> Self {
        Self { alpha, tonic: None }
    }
}

impl Default for BaselineDecomposer {
    fn default() -> Self {
        Self::new(0.02)
    }
}

impl EdaDecomposer for BaselineDecomposer {
    fn decompose(&mut self, _timestamp: f64, eda_microsiemens: f64) -> Decomposition {
        let tonic = match self.tonic {
            Some(prev) => prev + self.alpha * (eda_microsiemens - prev),
            None => eda_microsiemens,
        };
        self.tonic = Some(tonic);
        Decomposition {
            clean: eda_microsiemens,
            phasic: eda_microsiemens - tonic,
            tonic,
        }
    }
}

/// Engine-to-presentation callback surface. All methods have empty defaults
/// so listeners implement only what they care about.
pub trait SessionObserver: Send {
    fn on_sample_appended(&mut self, _timestamp: f64, _values: &[f64]) {}
    fn on_marker_added(&mut self, _marker: &Marker) {}
    fn on_marker_removed(&mut self, _id: MarkerId) {}
    fn on_state_changed(&mut self, _old: SessionState, _new: SessionState) {}
}

/// Tunables for a session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Visible history per buffer, seconds.
    pub buffer_seconds: f64,
    /// Consumer tick rate, Hz.
    pub tick_rate_hz: f64,
    /// Consecutive decode failures before the link is flagged degraded.
    pub decode_failure_warn_threshold: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            buffer_seconds: 15.0,
            tick_rate_hz: 20.0,
            decode_failure_warn_threshold: 25,
        }
    }
}

/// The state machine coordinating decoder output, buffers and timeline.
pub struct SessionController {
    config: SessionConfig,
    state: SessionState,
    device_id: Option<String>,
    armed_at: Option<DateTime<Utc>>,
    primary: RollingBuffer,
    secondary: RollingBuffer,
    timeline: EventTimeline,
    observers: Vec<Box<dyn SessionObserver>>,
    samples_recorded: u64,
    decode_failures: u32,
}

impl SessionController {
    pub fn new(config: SessionConfig) -> Result<Self, BufferError> {
        let primary = RollingBuffer::with_history_seconds(
            config.buffer_seconds,
            config.tick_rate_hz,
            vec!["eda_us".into(), "heart_rate_bpm".into()],
        )?;
        let secondary = RollingBuffer::with_history_seconds(
            config.buffer_seconds,
            config.tick_rate_hz,
            vec!["phasic".into(), "tonic".into()],
        )?;
        Ok(Self {
            config,
            state: SessionState::Disconnected,
            device_id: None,
            armed_at: None,
            primary,
            secondary,
            timeline: EventTimeline::new(),
            observers: Vec::new(),
            samples_recorded: 0,
            decode_failures: 0,
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn device_id(&self) -> Option<&str> {
        self.device_id.as_deref()
    }

    pub fn armed_at(&self) -> Option<DateTime<Utc>> {
        self.armed_at
    }

    pub fn samples_recorded(&self) -> u64 {
        self.samples_recorded
    }

    pub fn add_observer(&mut self, observer: Box<dyn SessionObserver>) {
        self.observers.push(observer);
    }

    /// Bind a device. Only legal from `Disconnected`; connection-time failures
    /// (`DeviceNotFound`, `ConnectTimeout`) are produced by the transport
    /// layer before this is called, leaving the session disconnected.
    pub fn connect(&mut self, device_id: &str) -> Result<(), SessionError> {
        self.require(SessionState::Disconnected, SessionState::Connected)?;
        self.device_id = Some(device_id.to_string());
        self.enter(SessionState::Connected);
        Ok(())
    }

    /// Start a session: reset both buffers to their synthetic windows, discard
    /// any previous timeline, enable ingestion gated by the recording flag.
    pub fn arm(&mut self) -> Result<(), SessionError> {
        self.require(SessionState::Connected, SessionState::Armed)?;
        self.primary.reset();
        self.secondary.reset();
        self.timeline = EventTimeline::new();
        self.samples_recorded = 0;
        self.decode_failures = 0;
        self.armed_at = Some(Utc::now());
        self.enter(SessionState::Armed);
        Ok(())
    }

    /// Toggle the recording flag. Enabling is legal from `Armed`/`Paused` and
    /// a no-op when already recording; disabling is a no-op anywhere the flag
    /// is already off except before the session exists.
    pub fn set_recording(&mut self, recording: bool) -> Result<(), SessionError> {
        if recording {
            match self.state {
                SessionState::Armed | SessionState::Paused => {
                    self.enter(SessionState::Recording);
                    Ok(())
                }
                SessionState::Recording => Ok(()),
                from => Err(SessionError::IllegalTransition {
                    from,
                    requested: SessionState::Recording,
                }),
            }
        } else {
            match self.state {
                SessionState::Recording => {
                    self.enter(SessionState::Paused);
                    Ok(())
                }
                SessionState::Armed | SessionState::Paused | SessionState::Stopped => Ok(()),
                from => Err(SessionError::IllegalTransition {
                    from,
                    requested: SessionState::Paused,
                }),
            }
        }
    }

    /// End the session. Idempotent; terminal per session instance.
    pub fn stop(&mut self) -> Result<(), SessionError> {
        match self.state {
            SessionState::Armed | SessionState::Recording | SessionState::Paused => {
                self.enter(SessionState::Stopped);
                Ok(())
            }
            SessionState::Stopped => Ok(()),
            from => Err(SessionError::IllegalTransition {
                from,
                requested: SessionState::Stopped,
            }),
        }
    }

    /// Forced transition: unbind the device from any state, disabling
    /// recording regardless of the current flag. Idempotent.
    pub fn disconnect(&mut self) {
        if self.state == SessionState::Disconnected {
            return;
        }
        self.device_id = None;
        self.enter(SessionState::Disconnected);
    }

    /// Offer one sample plus its decomposition to the buffers. Pushed only in
    /// `Recording`; `Paused` and `Armed` skip the update entirely, leaving the
    /// buffers frozen. Returns whether the sample was appended.
    pub fn ingest(
        &mut self,
        sample: &Sample,
        decomposition: &Decomposition,
    ) -> Result<bool, BufferError> {
        if self.state != SessionState::Recording {
            return Ok(false);
        }
        if sample.channels.len() < 2 {
            return Err(BufferError::ChannelCountMismatch {
                expected: 2,
                actual: sample.channels.len(),
            });
        }

        self.primary.push(
            sample.timestamp,
            &[sample.channels[0], sample.channels[1]],
        )?;
        self.secondary.push(
            sample.timestamp,
            &[decomposition.phasic, decomposition.tonic],
        )?;
        self.samples_recorded += 1;

        for observer in &mut self.observers {
            observer.on_sample_appended(sample.timestamp, &sample.channels);
        }
        Ok(true)
    }

    /// Insert a marker anchored to the newest buffered timestamp. Legal only
    /// while recording, and only once at least one sample has been pushed in
    /// this session, so a marker can never predate the buffer epoch.
    pub fn insert_marker(&mut self, label: &str, color: &str) -> Result<MarkerId, SessionError> {
        if self.state != SessionState::Recording {
            return Err(SessionError::NotRecording { state: self.state });
        }
        if self.samples_recorded == 0 {
            return Err(SessionError::MarkerBeforeFirstSample);
        }

        let timestamp = self.primary.latest_timestamp();
        let id = self.timeline.insert_at(timestamp, label, color);
        // list() is insertion ordered, the new marker is last
        if let Some(marker) = self.timeline.list().last().cloned() {
            for observer in &mut self.observers {
                observer.on_marker_added(&marker);
            }
        }
        Ok(id)
    }

    /// Delete a marker by handle.
    pub fn remove_marker(&mut self, id: MarkerId) -> Result<Marker, crate::error::TimelineError> {
        let marker = self.timeline.remove(id)?;
        for observer in &mut self.observers {
            observer.on_marker_removed(id);
        }
        Ok(marker)
    }

    pub fn markers(&self) -> &[Marker] {
        self.timeline.list()
    }

    /// Snapshot of the dual-axis EDA + heart-rate buffer.
    pub fn primary_window(&self) -> BufferWindow {
        self.primary.window()
    }

    /// Snapshot of the phasic/tonic decomposition buffer.
    pub fn secondary_window(&self) -> BufferWindow {
        self.secondary.window()
    }

    pub fn buffer_capacity(&self) -> usize {
        self.primary.capacity()
    }

    /// Per-frame decode failure, reported by the notification domain. Counts
    /// toward a degraded-link warning but never forces a state transition.
    pub fn note_decode_failure(&mut self) {
        self.decode_failures += 1;
        if self.decode_failures == self.config.decode_failure_warn_threshold {
            tracing::warn!(
                failures = self.decode_failures,
                device = self.device_id.as_deref().unwrap_or("<none>"),
                "device link degraded: repeated frame decode failures"
            );
        }
    }

    pub fn link_degraded(&self) -> bool {
        self.decode_failures >= self.config.decode_failure_warn_threshold
    }

    fn require(
        &self,
        expected: SessionState,
        requested: SessionState,
    ) -> Result<(), SessionError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(SessionError::IllegalTransition {
                from: self.state,
                requested,
            })
        }
    }

    fn enter(&mut self, new: SessionState) {
        let old = self.state;
        self.state = new;
        for observer in &mut self.observers {
            observer.on_state_changed(old, new);
        }
    }
}
