use crate::camera::MediaDevices;
use crate::speech_input::RecognitionEngine;
use crate::speech_output::SynthesisEngine;
use std::fmt;
use std::sync::Arc;

/// An optional platform capability: either a handle to use, or nothing.
///
/// Absence is a normal outcome. Callers hide or disable the feature instead
/// of treating it as an error.
pub enum Capability<T> {
    Available(T),
    Unavailable,
}

impl<T> Capability<T> {
    pub fn is_available(&self) -> bool {
        matches!(self, Capability::Available(_))
    }

    pub fn as_available(&self) -> Option<&T> {
        match self {
            Capability::Available(handle) => Some(handle),
            Capability::Unavailable => None,
        }
    }
}

impl<T> From<Option<T>> for Capability<T> {
    fn from(handle: Option<T>) -> Self {
        match handle {
            Some(handle) => Capability::Available(handle),
            None => Capability::Unavailable,
        }
    }
}

impl<T: Clone> Clone for Capability<T> {
    fn clone(&self) -> Self {
        match self {
            Capability::Available(handle) => Capability::Available(handle.clone()),
            Capability::Unavailable => Capability::Unavailable,
        }
    }
}

impl<T> fmt::Debug for Capability<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::Available(_) => f.write_str("Available"),
            Capability::Unavailable => f.write_str("Unavailable"),
        }
    }
}

/// The host environment, seen through the three optional engines it may offer.
///
/// A browser host implements this over its global speech and media objects;
/// the terminal host implements it over local processes; tests substitute fakes.
pub trait CapabilityProvider {
    fn speech_recognition(&self) -> Capability<Arc<dyn RecognitionEngine>>;
    fn speech_synthesis(&self) -> Capability<Arc<dyn SynthesisEngine>>;
    fn media_devices(&self) -> Capability<Arc<dyn MediaDevices>>;
    fn browser_name(&self) -> String;
}

/// Read-only summary of what the host supports. Recomputed only on reload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilityRecord {
    pub speech_input_available: bool,
    pub speech_output_available: bool,
    pub camera_available: bool,
    pub browser_name: String,
}

impl CapabilityRecord {
    /// A message for hosts that cannot take spoken answers, if any.
    pub fn compatibility_notice(&self) -> Option<String> {
        if self.speech_input_available {
            return None;
        }
        Some(format!(
            "Speech input is not supported in {}. Try Chrome or Edge, or type your answers.",
            self.browser_name
        ))
    }
}

/// The detection result: the record plus the engine handles it describes.
#[derive(Debug, Clone)]
pub struct Platform {
    pub record: CapabilityRecord,
    pub recognition: Capability<Arc<dyn RecognitionEngine>>,
    pub synthesis: Capability<Arc<dyn SynthesisEngine>>,
    pub media: Capability<Arc<dyn MediaDevices>>,
}

/// Probes the provider once. Never fails.
pub fn detect<P: CapabilityProvider + ?Sized>(provider: &P) -> Platform {
    let recognition = provider.speech_recognition();
    let synthesis = provider.speech_synthesis();
    let media = provider.media_devices();

    let record = CapabilityRecord {
        speech_input_available: recognition.is_available(),
        speech_output_available: synthesis.is_available(),
        camera_available: media.is_available(),
        browser_name: provider.browser_name(),
    };
    tracing::info!(
        speech_input = record.speech_input_available,
        speech_output = record.speech_output_available,
        camera = record.camera_available,
        browser = %record.browser_name,
        "Detected platform capabilities"
    );

    Platform {
        record,
        recognition,
        synthesis,
        media,
    }
}
