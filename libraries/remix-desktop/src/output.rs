/// CPAL output stream pulling from the render graph
use crate::backend::NativeBackend;
use crate::error::{DesktopError, Result};
use crate::render::SharedGraph;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Stream, StreamConfig};
use crossbeam_channel::{bounded, Receiver, Sender};
use std::thread::{self, JoinHandle};
use tracing::{error, info, warn};

/// Commands sent to the output thread
enum OutputCommand {
    /// Pause the device stream
    Pause,
    /// Resume the device stream
    Resume,
    /// Drop the stream and exit
    Shutdown,
}

/// CPAL audio output
///
/// **Architecture**: a dedicated thread owns the CPAL `Stream` (which is not
/// `Send` on every platform). The stream callback locks the shared render
/// graph once per device buffer and renders straight into it.
pub struct CpalOutput {
    /// Channel to send commands to the output thread
    command_tx: Sender<OutputCommand>,
    /// Sample rate of the output device
    sample_rate: u32,
    /// Output thread, joined on drop
    thread: Option<JoinHandle<()>>,
}

impl CpalOutput {
    /// Open the default output device and start pulling from `backend`
    ///
    /// The backend adopts the device's sample rate before the stream starts.
    ///
    /// # Errors
    /// Returns an error if no device is found or the stream cannot be built
    pub fn new(backend: &NativeBackend) -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or(DesktopError::DeviceNotFound)?;

        let config = device.default_output_config()?;
        let sample_rate = config.sample_rate();
        let config = config.config();

        backend.set_sample_rate(sample_rate)?;
        Self::with_device_and_config(device, config, sample_rate, backend.shared_graph())
    }

    fn with_device_and_config(
        device: Device,
        config: StreamConfig,
        sample_rate: u32,
        graph: SharedGraph,
    ) -> Result<Self> {
        let (command_tx, command_rx) = bounded::<OutputCommand>(8);
        let (ready_tx, ready_rx) = bounded::<Result<()>>(1);

        let thread = thread::spawn(move || {
            Self::output_thread_run(device, config, graph, command_rx, ready_tx);
        });

        match ready_rx.recv() {
            Ok(Ok(())) => {
                info!("Output stream running at {} Hz", sample_rate);
                Ok(Self {
                    command_tx,
                    sample_rate,
                    thread: Some(thread),
                })
            }
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => Err(DesktopError::Disconnected),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn pause(&self) -> Result<()> {
        self.command_tx
            .send(OutputCommand::Pause)
            .map_err(|_| DesktopError::Disconnected)
    }

    pub fn resume(&self) -> Result<()> {
        self.command_tx
            .send(OutputCommand::Resume)
            .map_err(|_| DesktopError::Disconnected)
    }

    /// Output thread main loop
    ///
    /// Builds the stream, reports the outcome, then serves commands until
    /// shutdown or until every sender is gone.
    fn output_thread_run(
        device: Device,
        config: StreamConfig,
        graph: SharedGraph,
        command_rx: Receiver<OutputCommand>,
        ready_tx: Sender<Result<()>>,
    ) {
        let stream = match Self::build_stream(&device, &config, graph) {
            Ok(stream) => stream,
            Err(e) => {
                let _ = ready_tx.send(Err(e));
                return;
            }
        };
        let _ = ready_tx.send(Ok(()));

        while let Ok(cmd) = command_rx.recv() {
            match cmd {
                OutputCommand::Pause => {
                    if let Err(e) = stream.pause() {
                        warn!("Failed to pause output stream: {}", e);
                    }
                }
                OutputCommand::Resume => {
                    if let Err(e) = stream.play() {
                        warn!("Failed to resume output stream: {}", e);
                    }
                }
                OutputCommand::Shutdown => break,
            }
        }
        drop(stream);
    }

    fn build_stream(device: &Device, config: &StreamConfig, graph: SharedGraph) -> Result<Stream> {
        let channels = config.channels as usize;
        let mut stereo: Vec<f32> = Vec::new();

        let stream = device.build_output_stream(
            config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                Self::audio_callback(data, channels, &graph, &mut stereo);
            },
            |err| error!("Audio stream error: {}", err),
            None,
        )?;
        stream.play()?;
        Ok(stream)
    }

    /// Audio callback (runs in the real-time audio thread)
    fn audio_callback(data: &mut [f32], channels: usize, graph: &SharedGraph, stereo: &mut Vec<f32>) {
        let Ok(mut graph) = graph.lock() else {
            data.fill(0.0);
            return;
        };

        if channels == 2 {
            graph.render(data);
            return;
        }

        let frames = data.len() / channels.max(1);
        stereo.resize(frames * 2, 0.0);
        graph.render(stereo);

        for (frame, pair) in data.chunks_exact_mut(channels).zip(stereo.chunks_exact(2)) {
            match channels {
                1 => frame[0] = (pair[0] + pair[1]) * 0.5,
                _ => {
                    frame[0] = pair[0];
                    frame[1] = pair[1];
                    frame[2..].fill(0.0);
                }
            }
        }
    }
}

impl Drop for CpalOutput {
    fn drop(&mut self) {
        let _ = self.command_tx.send(OutputCommand::Shutdown);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl std::fmt::Debug for CpalOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CpalOutput")
            .field("sample_rate", &self.sample_rate)
            .finish()
    }
}
