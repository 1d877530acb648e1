//! Native host engines for the terminal client.
//!
//! Speech output is provided by whichever command-line synthesizer is
//! installed. Speech input and camera capture have no terminal equivalent
//! and are reported unavailable.

use interview_core::camera::MediaDevices;
use interview_core::capability::{Capability, CapabilityProvider};
use interview_core::speech_input::RecognitionEngine;
use interview_core::speech_output::{SynthesisEngine, Utterance, UtteranceOutcome};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::process::Command;
use tokio::sync::oneshot;

/// Words per minute at a rate of 1.0.
const BASE_WORDS_PER_MINUTE: f32 = 175.0;

/// Command-line synthesizers, in order of preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Narrator {
    EspeakNg,
    Espeak,
    Say,
    SpdSay,
}

impl Narrator {
    pub const ALL: [Narrator; 4] = [
        Narrator::EspeakNg,
        Narrator::Espeak,
        Narrator::Say,
        Narrator::SpdSay,
    ];

    pub fn program(self) -> &'static str {
        match self {
            Narrator::EspeakNg => "espeak-ng",
            Narrator::Espeak => "espeak",
            Narrator::Say => "say",
            Narrator::SpdSay => "spd-say",
        }
    }

    fn args(self, utterance: &Utterance) -> Vec<String> {
        let words_per_minute = (BASE_WORDS_PER_MINUTE * utterance.rate).round() as u32;
        match self {
            Narrator::EspeakNg | Narrator::Espeak => vec![
                "-v".to_string(),
                utterance.lang.to_lowercase(),
                "-s".to_string(),
                words_per_minute.to_string(),
                "-p".to_string(),
                ((utterance.pitch * 50.0).round().clamp(0.0, 99.0) as u32).to_string(),
                "--".to_string(),
                utterance.text.clone(),
            ],
            Narrator::Say => vec![
                "-r".to_string(),
                words_per_minute.to_string(),
                "--".to_string(),
                utterance.text.clone(),
            ],
            // spd-say takes a relative rate in -100..=100 and returns
            // immediately unless told to wait.
            Narrator::SpdSay => vec![
                "--wait".to_string(),
                "-l".to_string(),
                primary_language(&utterance.lang),
                "-r".to_string(),
                (((utterance.rate - 1.0) * 100.0).round().clamp(-100.0, 100.0) as i32).to_string(),
                "--".to_string(),
                utterance.text.clone(),
            ],
        }
    }
}

fn primary_language(tag: &str) -> String {
    tag.split(['-', '_'])
        .next()
        .unwrap_or(tag)
        .to_lowercase()
}

/// Finds the first installed narrator on the given `PATH` value.
pub fn locate_narrator(path: Option<&OsStr>) -> Option<(Narrator, PathBuf)> {
    let path = path?;
    Narrator::ALL.into_iter().find_map(|narrator| {
        std::env::split_paths(path)
            .map(|dir| dir.join(narrator.program()))
            .find(|candidate| is_executable(candidate))
            .map(|program| (narrator, program))
    })
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Narrates by running a synthesizer process per utterance.
pub struct CommandSynthesizer {
    narrator: Narrator,
    program: PathBuf,
    // Dropping or firing this sender kills the running process.
    current: Mutex<Option<oneshot::Sender<()>>>,
}

impl CommandSynthesizer {
    pub fn new(narrator: Narrator, program: PathBuf) -> Self {
        Self {
            narrator,
            program,
            current: Mutex::new(None),
        }
    }
}

impl SynthesisEngine for CommandSynthesizer {
    fn speak(&self, utterance: Utterance, done: oneshot::Sender<UtteranceOutcome>) {
        let (cancel_tx, cancel_rx) = oneshot::channel();
        // Replacing the previous sender cancels a narration still running.
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = Some(cancel_tx);

        let mut command = Command::new(&self.program);
        command
            .args(self.narrator.args(&utterance))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        let program = self.narrator.program();

        tokio::spawn(async move {
            let mut child = match command.spawn() {
                Ok(child) => child,
                Err(e) => {
                    let _ = done.send(UtteranceOutcome::Failed(format!(
                        "Failed to run {program}: {e}"
                    )));
                    return;
                }
            };

            let outcome = tokio::select! {
                status = child.wait() => match status {
                    Ok(status) if status.success() => UtteranceOutcome::Completed,
                    Ok(status) => UtteranceOutcome::Failed(format!("{program} exited with {status}")),
                    Err(e) => UtteranceOutcome::Failed(e.to_string()),
                },
                _ = cancel_rx => {
                    if let Err(e) = child.kill().await {
                        tracing::warn!("Failed to stop {program}: {e}");
                    }
                    UtteranceOutcome::Cancelled
                }
            };
            let _ = done.send(outcome);
        });
    }

    fn cancel(&self) {
        if let Some(cancel) = self
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            let _ = cancel.send(());
        }
    }
}

/// The terminal as a capability host.
pub struct NativePlatform {
    synthesizer: Option<Arc<CommandSynthesizer>>,
}

impl NativePlatform {
    /// Looks for a synthesizer on `PATH`.
    pub fn detect() -> Self {
        let synthesizer = locate_narrator(std::env::var_os("PATH").as_deref()).map(
            |(narrator, program)| {
                tracing::info!(program = %program.display(), "Found speech synthesizer");
                Arc::new(CommandSynthesizer::new(narrator, program))
            },
        );
        Self { synthesizer }
    }

    /// A host with narration switched off entirely.
    pub fn silent() -> Self {
        Self { synthesizer: None }
    }

    pub fn narrator(&self) -> Option<Narrator> {
        self.synthesizer.as_ref().map(|synthesizer| synthesizer.narrator)
    }
}

impl CapabilityProvider for NativePlatform {
    fn speech_recognition(&self) -> Capability<Arc<dyn RecognitionEngine>> {
        Capability::Unavailable
    }

    fn speech_synthesis(&self) -> Capability<Arc<dyn SynthesisEngine>> {
        self.synthesizer
            .clone()
            .map(|synthesizer| synthesizer as Arc<dyn SynthesisEngine>)
            .into()
    }

    fn media_devices(&self) -> Capability<Arc<dyn MediaDevices>> {
        Capability::Unavailable
    }

    fn browser_name(&self) -> String {
        "this terminal".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn utterance(text: &str) -> Utterance {
        Utterance {
            text: text.to_string(),
            lang: "en-US".to_string(),
            rate: 0.9,
            pitch: 1.0,
        }
    }

    #[cfg(unix)]
    fn install(dir: &Path, program: &str) {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join(program);
        fs::write(&path, "#!/bin/sh\n").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[test]
    fn espeak_arguments_carry_voice_rate_and_pitch() {
        let args = Narrator::EspeakNg.args(&utterance("-what is bias?"));
        assert_eq!(
            args,
            ["-v", "en-us", "-s", "158", "-p", "50", "--", "-what is bias?"]
        );
    }

    #[test]
    fn spd_say_waits_and_uses_a_relative_rate() {
        let args = Narrator::SpdSay.args(&utterance("hello"));
        assert_eq!(args, ["--wait", "-l", "en", "-r", "-10", "--", "hello"]);
    }

    #[cfg(unix)]
    #[test]
    fn the_preferred_installed_narrator_wins() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        install(first.path(), "say");
        install(second.path(), "espeak");
        fs::write(first.path().join("espeak-ng"), "not executable").unwrap();

        let path = std::env::join_paths([first.path(), second.path()]).unwrap();
        let (narrator, program) = locate_narrator(Some(path.as_os_str())).unwrap();

        assert_eq!(narrator, Narrator::Espeak);
        assert_eq!(program, second.path().join("espeak"));
    }

    #[test]
    fn no_path_means_no_narrator() {
        let empty = tempfile::tempdir().unwrap();
        assert_eq!(locate_narrator(None), None);
        assert_eq!(locate_narrator(Some(empty.path().as_os_str())), None);
    }

    #[tokio::test]
    async fn a_missing_program_reports_failure() {
        let missing = tempfile::tempdir().unwrap().path().join("espeak-ng");
        let synthesizer = CommandSynthesizer::new(Narrator::EspeakNg, missing);
        let (done_tx, done_rx) = oneshot::channel();

        synthesizer.speak(utterance("hello"), done_tx);

        assert!(matches!(
            done_rx.await.unwrap(),
            UtteranceOutcome::Failed(_)
        ));
    }

    #[test]
    fn the_terminal_offers_no_speech_input_or_camera() {
        let platform = interview_core::detect(&NativePlatform::silent());

        assert!(!platform.record.speech_input_available);
        assert!(!platform.record.camera_available);
        assert!(!platform.record.speech_output_available);
        assert!(platform.record.compatibility_notice().is_some());
    }
}
