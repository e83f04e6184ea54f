use std::sync::Arc;
use std::time::Duration;

use eframe::{egui, CreationContext};
use egui_plot::{Line, Plot, PlotPoints};
use leadstream::{ChannelId, EcgEngine, EngineConfig, Snapshot, SnapshotPublisher};
use log::warn;

// Redraw slower than the producer ticks; readers see whatever is newest.
const REDRAW_EVERY: Duration = Duration::from_millis(200);
const TRACE: egui::Color32 = egui::Color32::from_rgb(0x2e, 0xa0, 0x43);

struct ViewerApp {
    engine: EcgEngine,
    publisher: Arc<SnapshotPublisher>,
    paused: bool,
    frames: u64,
    repeated: u64,
    last_version: u64,
}

impl ViewerApp {
    fn new(_cc: &CreationContext<'_>, mut engine: EcgEngine) -> Self {
        let publisher = engine.publisher();
        if let Err(e) = engine.start() {
            warn!("engine did not start: {e}");
        }
        Self {
            engine,
            publisher,
            paused: false,
            frames: 0,
            repeated: 0,
            last_version: 0,
        }
    }

    fn toggle_pause(&mut self) {
        let result = if self.paused {
            self.engine.resume()
        } else {
            self.engine.pause()
        };
        match result {
            Ok(()) => self.paused = !self.paused,
            Err(e) => warn!("pause toggle failed: {e}"),
        }
    }

    fn lead_plot(ui: &mut egui::Ui, snapshot: &Snapshot, id: ChannelId) {
        let summary = snapshot.summary(id);
        ui.label(format!(
            "{id} | min {:.2} / max {:.2} | RMS {:.2}",
            summary.min, summary.max, summary.rms
        ));
        let points = PlotPoints::from_iter(
            snapshot
                .channel(id)
                .iter()
                .enumerate()
                .map(|(i, v)| [i as f64, *v]),
        );
        Plot::new(format!("lead-plot-{}", id.get()))
            .height(110.0)
            .allow_drag(false)
            .allow_zoom(false)
            .allow_scroll(false)
            .show_axes([false, false])
            .include_x(0.0)
            .include_x(snapshot.buffer_len() as f64)
            .include_y(-2.0)
            .include_y(2.0)
            .show(ui, |plot_ui| {
                plot_ui.line(Line::new(points).color(TRACE));
            });
    }
}

impl eframe::App for ViewerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let snapshot = self.publisher.read();
        self.frames += 1;
        if snapshot.version() == self.last_version {
            self.repeated += 1;
        }
        self.last_version = snapshot.version();

        egui::TopBottomPanel::top("controls").show(ctx, |ui| {
            ui.horizontal(|ui| {
                let label = if self.paused { "Resume" } else { "Pause" };
                if ui.button(label).clicked() {
                    self.toggle_pause();
                }
                ui.label(format!(
                    "version {} | {} redraws, {} without a new tick",
                    snapshot.version(),
                    self.frames,
                    self.repeated
                ));
            });
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            egui::ScrollArea::vertical().show(ui, |ui| {
                ui.columns(2, |columns| {
                    for id in ChannelId::all() {
                        let column = &mut columns[id.index() % 2];
                        Self::lead_plot(column, &snapshot, id);
                        column.separator();
                    }
                });
            });
        });

        ctx.request_repaint_after(REDRAW_EVERY);
    }
}

fn main() -> eframe::Result<()> {
    env_logger::init();
    let config = match std::env::args().nth(1) {
        Some(path) => EngineConfig::from_json_file(&path).unwrap_or_else(|e| {
            warn!("could not load {path}: {e}; using defaults");
            EngineConfig::default()
        }),
        None => EngineConfig::default(),
    };
    let engine = match EcgEngine::new(config) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("failed to build engine: {e}");
            std::process::exit(1);
        }
    };
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1100.0, 900.0])
            .with_title("12-Lead ECG Monitor"),
        ..Default::default()
    };
    eframe::run_native(
        "leadstream viewer",
        options,
        Box::new(move |cc| Box::new(ViewerApp::new(cc, engine))),
    )
}
