use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use gc_core::error::GcError;
use gc_core::frame::{Frame, FrameBuffer};
use gc_core::traits::{FrameSource, SourceInfo};

/// Délai maximal pour le probe ffprobe.
const PROBE_TIMEOUT: Duration = Duration::from_secs(9);
/// Délai maximal pour obtenir la première frame décodée.
const OPEN_TIMEOUT: Duration = Duration::from_secs(20);

/// Métadonnées de flux vidéo rapportées par ffprobe.
#[derive(Clone, Copy, Debug)]
pub struct VideoInfo {
    pub width: u32,
    pub height: u32,
    /// Frame rate déclaré par le conteneur.
    pub fps: f64,
    pub duration_s: Option<f64>,
    pub frame_count: Option<u64>,
}

/// Interroge `ffprobe` sur le premier flux vidéo du fichier.
///
/// # Errors
/// `GcError::SourceOpen` when ffprobe is unavailable or rejects the file,
/// `GcError::Timeout` after 9 s.
pub fn probe_video(path: &Path) -> Result<VideoInfo, GcError> {
    let child = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=width,height,r_frame_rate,duration,nb_frames",
            "-of",
            "default=noprint_wrappers=1",
        ])
        .arg(path)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| GcError::source_open("ffprobe", format!("lancement impossible : {e}")))?;

    let output = wait_with_timeout(child, PROBE_TIMEOUT, "ffprobe")?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(GcError::source_open(
            "ffprobe",
            format!("{} : {}", path.display(), stderr.trim()),
        ));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let mut width = None;
    let mut height = None;
    let mut fps = None;
    let mut duration = None;
    let mut nb_frames = None;
    for line in stdout.lines() {
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        match key.trim() {
            "width" => width = value.trim().parse::<u32>().ok(),
            "height" => height = value.trim().parse::<u32>().ok(),
            "r_frame_rate" => fps = parse_rate(value.trim()),
            "duration" => duration = value.trim().parse::<f64>().ok(),
            "nb_frames" => nb_frames = value.trim().parse::<u64>().ok(),
            _ => {}
        }
    }

    let (width, height) = match (width, height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => {
            return Err(GcError::source_open(
                "ffprobe",
                format!("dimensions absentes pour {}", path.display()),
            ));
        }
    };
    let fps = fps.unwrap_or_else(|| {
        log::warn!("frame rate non déclaré, 25 fps par défaut");
        25.0
    });

    Ok(VideoInfo {
        width,
        height,
        fps,
        duration_s: duration,
        frame_count: nb_frames,
    })
}

/// Parse un taux rationnel ffprobe (`30000/1001` ou `30`).
fn parse_rate(s: &str) -> Option<f64> {
    let rate = match s.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.parse().ok()?;
            let den: f64 = den.parse().ok()?;
            if den == 0.0 { return None; }
            num / den
        }
        None => s.parse().ok()?,
    };
    (rate > 0.0).then_some(rate)
}

/// Attend la fin du process avec échéance ; tue et rapporte `Timeout` au-delà.
fn wait_with_timeout(
    mut child: Child,
    timeout: Duration,
    component: &'static str,
) -> Result<std::process::Output, GcError> {
    let deadline = Instant::now() + timeout;
    loop {
        match child.try_wait() {
            Ok(Some(_)) => {
                return child
                    .wait_with_output()
                    .map_err(|e| GcError::source_open(component, e.to_string()));
            }
            Ok(None) => {
                if Instant::now() >= deadline {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(GcError::Timeout {
                        component,
                        seconds: timeout.as_secs(),
                    });
                }
                std::thread::sleep(Duration::from_millis(25));
            }
            Err(e) => return Err(GcError::source_open(component, e.to_string())),
        }
    }
}

/// Lit exactement `buf.len()` octets. `Ok(false)` sur EOF propre en début
/// de frame ; erreur sur EOF au milieu d'une frame.
fn read_exact_or_eof(reader: &mut impl Read, buf: &mut [u8]) -> std::io::Result<bool> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => {
                if filled == 0 {
                    return Ok(false);
                }
                return Err(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    format!("frame tronquée : {filled}/{} octets", buf.len()),
                ));
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(true)
}

/// Source vidéo : pipe `ffmpeg` rawvideo RGBA, décodage dans un thread
/// dédié, frames livrées par canal borné (backpressure naturelle).
#[derive(Debug)]
pub struct VideoSource {
    info: VideoInfo,
    /// Cadence effective de sortie (cible demandée, sinon taux déclaré).
    fps: f64,
    rx: flume::Receiver<Result<FrameBuffer, GcError>>,
    child: Child,
    index: u64,
    waiting_first: bool,
    done: bool,
}

impl VideoSource {
    /// Probe puis ouvre le pipe de décodage.
    ///
    /// `target_fps = None` (« auto ») suit le taux déclaré par le conteneur.
    ///
    /// # Errors
    /// `GcError::SourceOpen`, `GcError::Timeout` (probe 9 s, ouverture 20 s).
    pub fn open(path: &Path, target_fps: Option<f64>) -> Result<Self, GcError> {
        let info = probe_video(path)?;
        let fps = target_fps.unwrap_or(info.fps);

        let mut child = Command::new("ffmpeg")
            .args(["-v", "error", "-i"])
            .arg(path)
            .args(["-f", "rawvideo", "-pix_fmt", "rgba", "-r", &format!("{fps}"), "-"])
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .stdin(Stdio::null())
            .spawn()
            .map_err(|e| GcError::source_open("ffmpeg", format!("lancement impossible : {e}")))?;

        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| GcError::source_open("ffmpeg", "stdout indisponible"))?;

        let (tx, rx) = flume::bounded::<Result<FrameBuffer, GcError>>(4);
        let (width, height) = (info.width, info.height);
        std::thread::Builder::new()
            .name("video-decode".into())
            .spawn(move || {
                let frame_len = (width * height * 4) as usize;
                loop {
                    let mut data = vec![0u8; frame_len];
                    match read_exact_or_eof(&mut stdout, &mut data) {
                        Ok(true) => {
                            let fb = FrameBuffer {
                                data,
                                width,
                                height,
                            };
                            if tx.send(Ok(fb)).is_err() {
                                return; // consommateur parti
                            }
                        }
                        Ok(false) => return, // fin de flux propre
                        Err(e) => {
                            let _ = tx.send(Err(GcError::decode("video", e.to_string())));
                            return;
                        }
                    }
                }
            })
            .map_err(|e| GcError::source_open("video", e.to_string()))?;

        log::info!(
            "vidéo ouverte : {} ({}×{}, {fps:.3} fps)",
            path.display(),
            info.width,
            info.height
        );
        Ok(Self {
            info,
            fps,
            rx,
            child,
            index: 0,
            waiting_first: true,
            done: false,
        })
    }
}

impl FrameSource for VideoSource {
    fn describe(&self) -> SourceInfo {
        let frame_count = self.info.frame_count.or_else(|| {
            self.info
                .duration_s
                .map(|d| (d * self.fps).round() as u64)
        });
        SourceInfo {
            width: self.info.width,
            height: self.info.height,
            frame_count,
            nominal_fps: Some(self.info.fps),
        }
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, GcError> {
        if self.done {
            return Ok(None);
        }

        let received = if self.waiting_first {
            // Seule la première frame est soumise au délai d'ouverture ;
            // les décodes suivants n'ont pas de timeout propre.
            match self.rx.recv_timeout(OPEN_TIMEOUT) {
                Ok(r) => Some(r),
                Err(flume::RecvTimeoutError::Timeout) => {
                    self.done = true;
                    return Err(GcError::Timeout {
                        component: "video",
                        seconds: OPEN_TIMEOUT.as_secs(),
                    });
                }
                Err(flume::RecvTimeoutError::Disconnected) => None,
            }
        } else {
            self.rx.recv().ok()
        };
        self.waiting_first = false;

        match received {
            Some(Ok(buffer)) => {
                let timestamp_us = (self.index as f64 * 1_000_000.0 / self.fps).round() as i64;
                let delay_ms = (1000.0 / self.fps).round() as u32;
                self.index += 1;
                Ok(Some(Frame {
                    buffer,
                    timestamp_us,
                    delay_ms,
                }))
            }
            Some(Err(e)) => {
                self.done = true;
                Err(e)
            }
            None => {
                self.done = true;
                Ok(None)
            }
        }
    }
}

impl Drop for VideoSource {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_parsing() {
        assert_eq!(parse_rate("30/1"), Some(30.0));
        assert!((parse_rate("30000/1001").unwrap() - 29.97).abs() < 0.01);
        assert_eq!(parse_rate("25"), Some(25.0));
        assert_eq!(parse_rate("0/0"), None);
        assert_eq!(parse_rate("garbage"), None);
    }

    #[test]
    fn read_exact_distinguishes_clean_eof_from_truncation() {
        let mut full = std::io::Cursor::new(vec![1u8; 8]);
        let mut buf = [0u8; 4];
        assert!(read_exact_or_eof(&mut full, &mut buf).unwrap());
        assert!(read_exact_or_eof(&mut full, &mut buf).unwrap());
        assert!(!read_exact_or_eof(&mut full, &mut buf).unwrap());

        let mut short = std::io::Cursor::new(vec![1u8; 6]);
        let mut buf = [0u8; 4];
        assert!(read_exact_or_eof(&mut short, &mut buf).unwrap());
        assert!(read_exact_or_eof(&mut short, &mut buf).is_err());
    }

    #[test]
    fn probe_missing_file_fails() {
        let err = probe_video(Path::new("/nonexistent/clip.mp4")).unwrap_err();
        assert!(matches!(
            err,
            GcError::SourceOpen { .. } | GcError::Timeout { .. }
        ));
    }
}
