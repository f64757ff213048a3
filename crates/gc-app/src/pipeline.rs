//! Pipeline d'animation : extraction → conversion → encodage → finalisation,
//! avec cache d'extraction par source, progression, annulation coopérative
//! et soumission par lots à l'hôte d'encodeurs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use gc_ascii::Converter;
use gc_core::config::ConverterConfig;
use gc_core::error::GcError;
use gc_core::frame::{Frame, FrameBuffer};
use gc_core::traits::FrameSource;
use gc_export::{EncoderFrame, EncoderHost, EncoderOptions, OutputFormat, Rasterizer};

/// Cadence de repli quand ni la config ni la source n'en déclarent une.
const FALLBACK_FPS: f64 = 10.0;

/// Phases d'un job, dans l'ordre d'exécution.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    Extracting,
    Converting,
    Encoding,
    Finalizing,
}

/// Événement de progression : fraction ∈ [0, 1], monotone dans une phase.
#[derive(Clone, Copy, Debug)]
pub struct ProgressEvent {
    pub fraction: f32,
    pub phase: Phase,
}

/// Drapeau d'annulation partagé. Idempotent.
///
/// # Example
/// ```
/// use gc_app::pipeline::CancelToken;
/// let token = CancelToken::new();
/// assert!(!token.is_cancelled());
/// token.cancel();
/// token.cancel();
/// assert!(token.is_cancelled());
/// ```
#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Demande l'arrêt ; les annulations répétées sont des no-ops.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Terminaison d'un job : l'annulation n'est pas une erreur.
pub enum JobOutcome {
    /// Flux encodé complet.
    Finished(Vec<u8>),
    /// Annulation coopérative observée.
    Cancelled,
}

/// Poignée d'un job en cours.
pub struct JobHandle {
    pub id: u64,
    cancel: CancelToken,
    progress: flume::Receiver<ProgressEvent>,
    result: flume::Receiver<Result<JobOutcome, GcError>>,
}

impl JobHandle {
    /// Jeton d'annulation du job.
    #[must_use]
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Canal de progression ; se ferme à la fin du job.
    #[must_use]
    pub fn progress(&self) -> &flume::Receiver<ProgressEvent> {
        &self.progress
    }

    /// Attend la fin du job et rend son résultat.
    ///
    /// # Errors
    /// The job's error, or `GcError::Encode` if the worker vanished.
    pub fn wait(self) -> Result<JobOutcome, GcError> {
        self.result
            .recv()
            .unwrap_or_else(|_| Err(GcError::encode("pipeline", "worker disparu")))
    }
}

/// Frames extraites d'une source, à une cadence connue.
struct CachedFrames {
    fps: f64,
    frames: Arc<Vec<Frame>>,
}

type ActiveJobs = Arc<Mutex<HashMap<String, (u64, CancelToken)>>>;
type ExtractCache = Arc<Mutex<Option<(String, CachedFrames)>>>;

/// Orchestrateur : au plus un job actif par source, un cache d'extraction
/// par source active.
#[derive(Default)]
pub struct AnimationPipeline {
    next_job_id: u64,
    active: ActiveJobs,
    cache: ExtractCache,
}

impl AnimationPipeline {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Démarre un job d'encodage pour `source`. Un job déjà actif sur la
    /// même source est annulé d'abord (au plus un job par source).
    ///
    /// # Errors
    /// `GcError::Config` when the configuration is invalid.
    pub fn start(
        &mut self,
        source_key: &str,
        source: Box<dyn FrameSource>,
        config: ConverterConfig,
        format: OutputFormat,
        rasterizer: Arc<Rasterizer>,
        repeat: i32,
    ) -> Result<JobHandle, GcError> {
        let converter = Converter::new(&config)?;

        {
            let active = self.active.lock().expect("verrou actif");
            if let Some((prev_id, prev_token)) = active.get(source_key) {
                log::info!("job {prev_id} encore actif sur cette source, annulation");
                prev_token.cancel();
            }
        }

        let id = self.next_job_id;
        self.next_job_id += 1;
        let cancel = CancelToken::new();
        let (progress_tx, progress_rx) = flume::unbounded();
        let (result_tx, result_rx) = flume::bounded(1);

        self.active
            .lock()
            .expect("verrou actif")
            .insert(source_key.to_string(), (id, cancel.clone()));

        let worker = JobWorker {
            source_key: source_key.to_string(),
            config,
            format,
            repeat,
            converter,
            rasterizer,
            cache: Arc::clone(&self.cache),
            active: Arc::clone(&self.active),
            cancel: cancel.clone(),
            progress: progress_tx,
        };
        std::thread::Builder::new()
            .name(format!("gc-job-{id}"))
            .spawn(move || {
                let outcome = worker.run(source);
                worker.finish(id);
                let _ = result_tx.send(outcome);
            })
            .map_err(|e| GcError::encode("pipeline", e.to_string()))?;

        Ok(JobHandle {
            id,
            cancel,
            progress: progress_rx,
            result: result_rx,
        })
    }
}

/// Indices de sous-échantillonnage : frame `i` de sortie ←
/// `⌊i · f_cached / f_out⌋` du cache.
fn downsample_indices(cached_len: usize, f_cached: f64, f_out: f64) -> Vec<usize> {
    let mut indices = Vec::new();
    let mut i = 0u64;
    loop {
        let idx = (i as f64 * f_cached / f_out).floor() as usize;
        if idx >= cached_len {
            break;
        }
        indices.push(idx);
        i += 1;
    }
    indices
}

struct JobWorker {
    source_key: String,
    config: ConverterConfig,
    format: OutputFormat,
    /// Nombre de boucles GIF (0 = infini, < 0 = aucune).
    repeat: i32,
    converter: Converter,
    rasterizer: Arc<Rasterizer>,
    cache: ExtractCache,
    active: ActiveJobs,
    cancel: CancelToken,
    progress: flume::Sender<ProgressEvent>,
}

impl JobWorker {
    fn emit(&self, phase: Phase, fraction: f32) {
        let _ = self.progress.send(ProgressEvent {
            fraction: fraction.clamp(0.0, 1.0),
            phase,
        });
    }

    /// Retire le job du registre des jobs actifs.
    fn finish(&self, id: u64) {
        let mut active = self.active.lock().expect("verrou actif");
        if let Some((current, _)) = active.get(&self.source_key) {
            if *current == id {
                active.remove(&self.source_key);
            }
        }
    }

    /// Annulation observée : détruit le cache de la source et rend
    /// `Cancelled`.
    fn cancelled(&self) -> Result<JobOutcome, GcError> {
        let mut cache = self.cache.lock().expect("verrou cache");
        if cache.as_ref().is_some_and(|(key, _)| *key == self.source_key) {
            *cache = None;
        }
        log::info!("job annulé ({})", self.source_key);
        Ok(JobOutcome::Cancelled)
    }

    fn run(&self, mut source: Box<dyn FrameSource>) -> Result<JobOutcome, GcError> {
        let info = source.describe();

        // === Phase 1 : extraction (ou réutilisation du cache) ===
        self.emit(Phase::Extracting, 0.0);
        let mut f_out = self
            .config
            .frame_rate
            .or(info.nominal_fps)
            .unwrap_or(FALLBACK_FPS);

        let reusable: Option<(Arc<Vec<Frame>>, f64)> = {
            let cache = self.cache.lock().expect("verrou cache");
            match cache.as_ref() {
                Some((key, cached)) if *key == self.source_key && cached.fps >= f_out => {
                    Some((Arc::clone(&cached.frames), cached.fps))
                }
                _ => None,
            }
        };

        let frames: Arc<Vec<Frame>> = if let Some((cached, f_cached)) = reusable {
            log::debug!(
                "cache réutilisé : {} frames à {f_cached:.2} fps → {f_out:.2} fps",
                cached.len()
            );
            let indices = downsample_indices(cached.len(), f_cached, f_out);
            let delay_ms = (1000.0 / f_out).round().max(1.0) as u32;
            let resampled = indices
                .iter()
                .enumerate()
                .map(|(i, &idx)| Frame {
                    buffer: cached[idx].buffer.clone(),
                    timestamp_us: (i as f64 * 1_000_000.0 / f_out).round() as i64,
                    delay_ms,
                })
                .collect::<Vec<_>>();
            self.emit(Phase::Extracting, 1.0);
            Arc::new(resampled)
        } else {
            let mut extracted = Vec::new();
            loop {
                if self.cancel.is_cancelled() {
                    return self.cancelled();
                }
                match source.next_frame() {
                    Ok(Some(frame)) => {
                        extracted.push(frame);
                        let fraction = match info.frame_count {
                            Some(total) if total > 0 => extracted.len() as f32 / total as f32,
                            _ => extracted.len() as f32 / (extracted.len() + 1) as f32,
                        };
                        self.emit(Phase::Extracting, fraction.min(1.0));
                    }
                    Ok(None) => break,
                    // Échec en cours de flux : les frames partielles ne
                    // sont jamais livrées en aval.
                    Err(e) => return Err(e),
                }
            }
            if extracted.is_empty() {
                return Err(GcError::decode(
                    "pipeline",
                    "la source n'a produit aucune frame",
                ));
            }
            self.emit(Phase::Extracting, 1.0);

            // Cadence effective dérivée des délais natifs si rien n'était
            // déclaré (GIF animé en mode natif).
            if self.config.frame_rate.is_none() && info.nominal_fps.is_none() {
                let total_ms: u64 = extracted.iter().map(|f| u64::from(f.delay_ms)).sum();
                if total_ms > 0 {
                    f_out = extracted.len() as f64 * 1000.0 / total_ms as f64;
                }
            }

            let frames = Arc::new(extracted);
            let mut cache = self.cache.lock().expect("verrou cache");
            *cache = Some((
                self.source_key.clone(),
                CachedFrames {
                    fps: f_out,
                    frames: Arc::clone(&frames),
                },
            ));
            frames
        };

        // === Phase 2 : conversion + rasterisation ===
        let total = frames.len();
        let mut bitmaps: Vec<FrameBuffer> = Vec::with_capacity(total);
        for (i, frame) in frames.iter().enumerate() {
            if self.cancel.is_cancelled() {
                return self.cancelled();
            }
            let grid = self.converter.convert(&frame.buffer);
            bitmaps.push(self.rasterizer.render(&grid, self.config.background));
            self.emit(Phase::Converting, (i + 1) as f32 / total as f32);
            if (i + 1) % 10 == 0 {
                // Laisse la main à l'ordonnanceur.
                std::thread::yield_now();
            }
        }

        let (out_w, out_h) = (bitmaps[0].width, bitmaps[0].height);
        if out_w == 0 || out_h == 0 {
            return Err(GcError::encode(
                "pipeline",
                "grille dégénérée : rien à encoder",
            ));
        }

        // === Phase 3 : encodage par lots ===
        if self.cancel.is_cancelled() {
            return self.cancelled();
        }
        let keyframe_interval = (f_out * 2.0).round().max(1.0) as u32;
        let options = EncoderOptions {
            gif_quality: self.config.gif_quality,
            repeat: self.repeat,
            keyframe_interval,
        };
        let mut host = EncoderHost::create(self.format, out_w, out_h, Some(f_out), options)?;

        let batch_size = match self.format {
            OutputFormat::Gif => {
                let threads = std::thread::available_parallelism().map_or(1, |n| n.get());
                (2 * threads).max(12)
            }
            OutputFormat::Mp4 => 1,
        };
        let duration_us = (1_000_000.0 / f_out).round() as i64;

        let mut submitted = 0usize;
        let mut gif_clock_us: i64 = 0;
        while submitted < total {
            if self.cancel.is_cancelled() {
                host.cancel();
                return self.cancelled();
            }
            let end = (submitted + batch_size).min(total);
            let mut batch = Vec::with_capacity(end - submitted);
            for i in submitted..end {
                let (timestamp_us, duration_us) = match self.format {
                    // Vidéo : horodatage uniforme à la cadence de sortie.
                    OutputFormat::Mp4 => (
                        (i as f64 * 1_000_000.0 / f_out).round() as i64,
                        duration_us,
                    ),
                    // GIF : les délais natifs par frame font foi.
                    OutputFormat::Gif => {
                        let d = if frames[i].delay_ms > 0 {
                            i64::from(frames[i].delay_ms) * 1000
                        } else {
                            duration_us
                        };
                        let ts = gif_clock_us;
                        gif_clock_us += d.max(1);
                        (ts, d)
                    }
                };
                batch.push(EncoderFrame {
                    rgba: &bitmaps[i].data,
                    timestamp_us,
                    duration_us,
                    is_key: (i as u32) % keyframe_interval == 0,
                });
            }
            host.add_frames(&batch)?;
            submitted = end;
            self.emit(Phase::Encoding, submitted as f32 / total as f32);
            std::thread::yield_now();
        }

        // === Phase 4 : finalisation ===
        if self.cancel.is_cancelled() {
            host.cancel();
            return self.cancelled();
        }
        self.emit(Phase::Finalizing, 0.0);
        let bytes = host.finalize()?;
        self.emit(Phase::Finalizing, 1.0);
        log::info!(
            "job terminé : {} frames, {} octets ({})",
            total,
            bytes.len(),
            self.source_key
        );
        Ok(JobOutcome::Finished(bytes))
    }
}
