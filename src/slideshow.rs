use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use chrono::Local;
use image::DynamicImage;
use tracing::{debug, error, info, warn};

use crate::codec;
use crate::compositor;
use crate::config::FrameConfig;
use crate::constants::STOP_TIMEOUT_MS;
use crate::error::{FrameError, Result};
use crate::overlay;
use crate::panel::{Panel, PanelGeometry};
use crate::playlist::Playlist;

/// Manual operations, consumed by the worker between ticks.
///
/// `Next`/`Previous` only move the index; pair them with `ShowNow` when the
/// new photo should appear immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Next,
    Previous,
    ShowNow,
    Stop,
}

/// Handle to a running slideshow. Dropping it (or calling [`stop`]) ends
/// the background worker; a fresh [`start`] begins again at index 0.
///
/// [`stop`]: Slideshow::stop
/// [`start`]: Slideshow::start
pub struct Slideshow {
    commands: Sender<Command>,
    worker: Option<JoinHandle<()>>,
}

impl Slideshow {
    /// Spawns the slideshow worker. Fails, leaving nothing running, when
    /// the active folder yields no images.
    pub fn start(config_path: PathBuf, panel: Box<dyn Panel>) -> Result<Self> {
        let config = FrameConfig::load_or_default(&config_path);
        let playlist = Playlist::from_folder(config.active_folder(), config.slideshow.shuffle);
        if playlist.is_empty() {
            return Err(FrameError::Slideshow(format!(
                "no images found in {}",
                config.active_folder().display()
            )));
        }

        let (commands, receiver) = mpsc::channel();
        let mut worker = Worker { config_path, config, playlist, panel, commands: receiver };
        let handle = thread::Builder::new()
            .name("slideshow".into())
            .spawn(move || worker.run())
            .map_err(|err| FrameError::Slideshow(format!("failed to spawn worker: {err}")))?;

        Ok(Self { commands, worker: Some(handle) })
    }

    pub fn next(&self) {
        let _ = self.commands.send(Command::Next);
    }

    pub fn previous(&self) {
        let _ = self.commands.send(Command::Previous);
    }

    /// Renders the current photo without waiting for the next tick.
    pub fn show_now(&self) {
        let _ = self.commands.send(Command::ShowNow);
    }

    /// Signals the worker and joins it with a bounded timeout.
    pub fn stop(mut self) {
        let _ = self.commands.send(Command::Stop);
        if let Some(handle) = self.worker.take() {
            let deadline = Instant::now() + Duration::from_millis(STOP_TIMEOUT_MS);
            while !handle.is_finished() && Instant::now() < deadline {
                thread::sleep(Duration::from_millis(20));
            }
            if handle.is_finished() {
                let _ = handle.join();
            } else {
                warn!("slideshow worker did not stop within {STOP_TIMEOUT_MS}ms; detaching");
            }
        }
    }

    /// Blocks until the worker exits on its own.
    pub fn wait(mut self) {
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Slideshow {
    fn drop(&mut self) {
        if self.worker.is_some() {
            let _ = self.commands.send(Command::Stop);
        }
    }
}

struct Worker {
    config_path: PathBuf,
    config: FrameConfig,
    playlist: Playlist,
    panel: Box<dyn Panel>,
    commands: Receiver<Command>,
}

impl Worker {
    fn run(&mut self) {
        info!("slideshow started with {} images", self.playlist.len());
        loop {
            self.refresh_config();
            self.show_current();
            self.playlist.advance();
            if !self.sleep_with_commands(self.config.interval()) {
                break;
            }
        }
        self.panel.close();
        info!("slideshow stopped");
    }

    /// Re-reads the configuration file; an orientation or folder change
    /// rebuilds the playlist and resets the index to 0.
    fn refresh_config(&mut self) {
        let fresh = FrameConfig::load_or_default(&self.config_path);
        let folder_changed = fresh.photos.orientation != self.config.photos.orientation
            || fresh.active_folder() != self.config.active_folder();
        if folder_changed {
            info!(
                "configuration changed; reloading playlist from {}",
                fresh.active_folder().display()
            );
            self.playlist = Playlist::from_folder(fresh.active_folder(), fresh.slideshow.shuffle);
        }
        self.config = fresh;
    }

    /// A bad frame is logged and skipped; the loop itself never dies.
    fn show_current(&mut self) {
        let Some(path) = self.playlist.current().map(Path::to_path_buf) else {
            debug!("playlist is empty; nothing to display");
            return;
        };
        debug!("displaying {}", path.display());
        if let Err(err) = self.render_and_send(&path) {
            error!("failed to display {}: {err}", path.display());
        }
    }

    fn render_and_send(&mut self, path: &Path) -> Result<()> {
        let geometry = PanelGeometry::new(
            self.panel.width(),
            self.panel.height(),
            self.config.photos.orientation,
            self.config.display.inverse,
        );
        let frame = compositor::compose(path, &geometry, self.config.display.maintain_aspect_ratio)?;
        let frame = overlay::render(frame, &self.overlay_lines(), &geometry);
        let (width, height) = frame.dimensions();
        let image = DynamicImage::ImageRgb8(frame);

        let buffer = codec::encode(&image, self.panel.pixel_format());
        if let Err(err) = self.panel.display_bitmap(&buffer, width, height) {
            warn!("direct transmit failed ({err}); falling back to a bitmap file");
            self.send_via_file(&image)?;
        }
        Ok(())
    }

    /// File-based fallback: write a temporary bitmap, hand the path to the
    /// sink, delete the file regardless of the outcome.
    fn send_via_file(&mut self, image: &DynamicImage) -> Result<()> {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        let path = std::env::temp_dir().join(format!("photoframe_{millis}.png"));
        image
            .save(&path)
            .map_err(|err| FrameError::Panel(format!("failed to write {}: {err}", path.display())))?;
        let sent = self.panel.display_file(&path);
        let _ = fs::remove_file(&path);
        sent
    }

    fn overlay_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        if self.config.slideshow.show_time {
            lines.push(Local::now().format("%H:%M").to_string());
        }
        if self.config.slideshow.show_counter {
            let (current, total) = self.playlist.position();
            lines.push(format!("[{current}/{total}]"));
        }
        lines
    }

    /// Waits out the tick interval while serving manual commands. Returns
    /// `false` when the worker should exit.
    fn sleep_with_commands(&mut self, interval: Duration) -> bool {
        let deadline = Instant::now() + interval;
        loop {
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            match self.commands.recv_timeout(deadline - now) {
                Ok(Command::Next) => self.playlist.advance(),
                Ok(Command::Previous) => self.playlist.retreat(),
                Ok(Command::ShowNow) => self.show_current(),
                Ok(Command::Stop) => return false,
                Err(RecvTimeoutError::Timeout) => return true,
                Err(RecvTimeoutError::Disconnected) => return false,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::WireFormat;
    use crate::panel::Orientation;
    use image::{Rgb, RgbImage};
    use std::sync::{Arc, Mutex};

    /// Sink double that records every transmitted frame.
    struct MemoryPanel {
        frames: Arc<Mutex<Vec<(u32, u32, usize)>>>,
        fail_direct: bool,
    }

    impl MemoryPanel {
        fn new() -> (Self, Arc<Mutex<Vec<(u32, u32, usize)>>>) {
            let frames = Arc::new(Mutex::new(Vec::new()));
            (Self { frames: frames.clone(), fail_direct: false }, frames)
        }
    }

    impl Panel for MemoryPanel {
        fn initialize(&mut self) -> Result<()> {
            Ok(())
        }

        fn width(&self) -> u32 {
            320
        }

        fn height(&self) -> u32 {
            480
        }

        fn pixel_format(&self) -> WireFormat {
            WireFormat::Rgb565Be
        }

        fn display_bitmap(&mut self, buffer: &[u8], width: u32, height: u32) -> Result<()> {
            if self.fail_direct {
                return Err(FrameError::Panel("direct transmit unsupported".into()));
            }
            self.frames.lock().unwrap().push((width, height, buffer.len()));
            Ok(())
        }

        fn display_file(&mut self, path: &Path) -> Result<()> {
            let image = image::open(path)
                .map_err(|err| FrameError::Panel(format!("bad bitmap file: {err}")))?;
            self.frames
                .lock()
                .unwrap()
                .push((image.width(), image.height(), usize::MAX));
            Ok(())
        }

        fn set_brightness(&mut self, _percent: u8) -> Result<()> {
            Ok(())
        }

        fn close(&mut self) {}
    }

    fn fixture(name: &str, folders: &[(&str, usize)]) -> PathBuf {
        let root = std::env::temp_dir().join(format!("photoframe-slideshow-{name}"));
        let _ = fs::remove_dir_all(&root);
        for (folder, count) in folders {
            let dir = root.join(folder);
            fs::create_dir_all(&dir).expect("create fixture folder");
            for i in 0..*count {
                let image = RgbImage::from_pixel(4, 6, Rgb([i as u8 * 40, 80, 120]));
                image.save(dir.join(format!("photo_{i}.png"))).expect("write fixture image");
            }
        }
        root
    }

    fn write_config(root: &Path, orientation: &str, portrait: &str, landscape: &str) -> PathBuf {
        let path = root.join("config.yaml");
        let doc = format!(
            "slideshow:\n  interval: 1\n  shuffle: false\n  show_time: true\nphotos:\n  orientation: {orientation}\n  portrait_folder: {}\n  landscape_folder: {}\n",
            root.join(portrait).display(),
            root.join(landscape).display(),
        );
        fs::write(&path, doc).expect("write fixture config");
        path
    }

    fn worker(config_path: PathBuf, panel: MemoryPanel) -> (Worker, Sender<Command>) {
        let config = FrameConfig::load_or_default(&config_path);
        let playlist = Playlist::from_folder(config.active_folder(), false);
        let (tx, rx) = mpsc::channel();
        (
            Worker { config_path, config, playlist, panel: Box::new(panel), commands: rx },
            tx,
        )
    }

    #[test]
    fn ticks_advance_the_index_modulo_length() {
        let root = fixture("modulo", &[("tall", 3)]);
        let config_path = write_config(&root, "portrait", "tall", "tall");
        let (panel, frames) = MemoryPanel::new();
        let (mut worker, _tx) = worker(config_path, panel);

        for ticks in 1..=5 {
            worker.show_current();
            worker.playlist.advance();
            assert_eq!(worker.playlist.index(), ticks % 3);
        }
        assert_eq!(frames.lock().unwrap().len(), 5);
        fs::remove_dir_all(&root).expect("cleanup fixture");
    }

    #[test]
    fn frames_arrive_canvas_sized_and_wire_encoded() {
        let root = fixture("encoding", &[("tall", 1)]);
        let config_path = write_config(&root, "portrait", "tall", "tall");
        let (panel, frames) = MemoryPanel::new();
        let (mut worker, _tx) = worker(config_path, panel);

        worker.show_current();
        let frames = frames.lock().unwrap();
        assert_eq!(frames.as_slice(), &[(320, 480, 320 * 480 * 2)]);
        fs::remove_dir_all(&root).expect("cleanup fixture");
    }

    #[test]
    fn orientation_switch_reloads_playlist_and_resets_index() {
        let root = fixture("switch", &[("tall", 2), ("wide", 3)]);
        let config_path = write_config(&root, "portrait", "tall", "wide");
        let (panel, _frames) = MemoryPanel::new();
        let (mut worker, _tx) = worker(config_path.clone(), panel);

        worker.playlist.advance();
        assert_eq!(worker.playlist.index(), 1);

        write_config(&root, "landscape", "tall", "wide");
        worker.refresh_config();
        assert_eq!(worker.config.photos.orientation, Orientation::Landscape);
        assert_eq!(worker.playlist.len(), 3);
        assert_eq!(worker.playlist.index(), 0);
        fs::remove_dir_all(&root).expect("cleanup fixture");
    }

    #[test]
    fn manual_commands_move_the_index_without_rendering() {
        let root = fixture("manual", &[("tall", 3)]);
        let config_path = write_config(&root, "portrait", "tall", "tall");
        let (panel, frames) = MemoryPanel::new();
        let (mut worker, tx) = worker(config_path, panel);

        tx.send(Command::Next).unwrap();
        tx.send(Command::Next).unwrap();
        tx.send(Command::Previous).unwrap();
        tx.send(Command::Stop).unwrap();
        assert!(!worker.sleep_with_commands(Duration::from_secs(30)));
        assert_eq!(worker.playlist.index(), 1);
        assert!(frames.lock().unwrap().is_empty(), "navigation must not render");
        fs::remove_dir_all(&root).expect("cleanup fixture");
    }

    #[test]
    fn show_now_renders_between_ticks() {
        let root = fixture("shownow", &[("tall", 2)]);
        let config_path = write_config(&root, "portrait", "tall", "tall");
        let (panel, frames) = MemoryPanel::new();
        let (mut worker, tx) = worker(config_path, panel);

        tx.send(Command::ShowNow).unwrap();
        tx.send(Command::Stop).unwrap();
        assert!(!worker.sleep_with_commands(Duration::from_secs(30)));
        assert_eq!(frames.lock().unwrap().len(), 1);
        fs::remove_dir_all(&root).expect("cleanup fixture");
    }

    #[test]
    fn direct_transmit_failure_falls_back_to_a_bitmap_file() {
        let root = fixture("fallback", &[("tall", 1)]);
        let config_path = write_config(&root, "portrait", "tall", "tall");
        let (mut panel, frames) = MemoryPanel::new();
        panel.fail_direct = true;
        let (mut worker, _tx) = worker(config_path, panel);

        worker.show_current();
        let frames = frames.lock().unwrap();
        assert_eq!(frames.as_slice(), &[(320, 480, usize::MAX)]);
        fs::remove_dir_all(&root).expect("cleanup fixture");
    }

    #[test]
    fn empty_playlist_skips_rendering_but_keeps_looping() {
        let root = fixture("idle", &[("empty", 0)]);
        let config_path = write_config(&root, "portrait", "empty", "empty");
        let (panel, frames) = MemoryPanel::new();
        let (mut worker, _tx) = worker(config_path, panel);

        worker.show_current();
        worker.playlist.advance();
        assert!(frames.lock().unwrap().is_empty());
        fs::remove_dir_all(&root).expect("cleanup fixture");
    }

    #[test]
    fn start_fails_when_the_folder_has_no_images() {
        let root = fixture("nostart", &[("empty", 0)]);
        let config_path = write_config(&root, "portrait", "empty", "empty");
        let (panel, _frames) = MemoryPanel::new();
        assert!(Slideshow::start(config_path, Box::new(panel)).is_err());
        fs::remove_dir_all(&root).expect("cleanup fixture");
    }

    #[test]
    fn started_slideshow_renders_and_stops_cleanly() {
        let root = fixture("lifecycle", &[("tall", 2)]);
        let config_path = write_config(&root, "portrait", "tall", "tall");
        let (panel, frames) = MemoryPanel::new();

        let slideshow = Slideshow::start(config_path, Box::new(panel)).expect("start slideshow");
        thread::sleep(Duration::from_millis(300));
        slideshow.stop();

        assert!(!frames.lock().unwrap().is_empty(), "first tick renders immediately");
        fs::remove_dir_all(&root).expect("cleanup fixture");
    }
}
