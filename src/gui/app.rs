use crate::config::Config;
use crate::gui::table::{Action, NotificationKind, Phase, ProcessTable};
use crate::manager::Manager;
use egui::{Align, Align2, Color32, Layout, RichText, ScrollArea, TextEdit};
use std::time::Duration;

/// What the user asked for during one frame. Executed after the panels are drawn.
enum Command {
    Refresh,
    SetFilter(String),
    Select(u32),
    Apply(Action),
    Dismiss,
}

/// Main application state for the Task Manager GUI
pub struct ProcessManagerApp {
    manager: Manager,
    table: ProcessTable,
    auto_refresh: bool,
    refresh_interval: Duration,
}

impl ProcessManagerApp {
    pub fn new(_cc: &eframe::CreationContext<'_>, config: &Config) -> Self {
        let mut app = Self {
            manager: Manager::new(),
            table: ProcessTable::default(),
            auto_refresh: config.auto_refresh,
            refresh_interval: config.refresh_interval(),
        };
        app.table.refresh(&mut app.manager);
        app
    }

    // The phase check only documents that refreshes never overlap; refresh is synchronous.
    fn refresh_due(&self) -> bool {
        self.table.phase() == Phase::Idle
            && self
                .table
                .last_refresh()
                .is_none_or(|at| at.elapsed() >= self.refresh_interval)
    }

    fn execute(&mut self, command: Command) {
        match command {
            Command::Refresh => self.table.refresh(&mut self.manager),
            Command::SetFilter(filter) => self.table.set_filter(filter, &mut self.manager),
            Command::Select(pid) => self.table.select(pid),
            Command::Apply(action) => self.table.apply(action, &mut self.manager),
            Command::Dismiss => self.table.dismiss_notification(),
        }
    }

    fn show_notification(&self, ctx: &egui::Context, command: &mut Option<Command>) {
        let Some(note) = self.table.notification() else {
            return;
        };
        let color = match note.kind {
            NotificationKind::Info => Color32::GREEN,
            NotificationKind::Warning => Color32::YELLOW,
            NotificationKind::Error => Color32::RED,
        };
        egui::Window::new(note.title.as_str())
            .collapsible(false)
            .resizable(false)
            .anchor(Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                ui.colored_label(color, note.message.as_str());
                ui.add_space(8.0);
                if ui.button("OK").clicked() {
                    *command = Some(Command::Dismiss);
                }
            });
    }
}

impl eframe::App for ProcessManagerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let modal_open = self.table.notification().is_some();

        // Auto-refresh logic
        if self.auto_refresh && !modal_open && self.refresh_due() {
            self.table.refresh(&mut self.manager);
        }
        if self.auto_refresh {
            ctx.request_repaint_after(self.refresh_interval);
        }

        let mut command: Option<Command> = None;

        // Search bar
        egui::TopBottomPanel::top("search_panel").show(ctx, |ui| {
            ui.add_enabled_ui(!modal_open, |ui| {
                ui.horizontal(|ui| {
                    ui.label("Search:");
                    let mut filter = self.table.filter().to_string();
                    let response = ui.add(TextEdit::singleline(&mut filter).desired_width(240.0));
                    if response.changed() {
                        command = Some(Command::SetFilter(filter));
                    }
                    ui.checkbox(&mut self.auto_refresh, "Auto Refresh");
                });
            });
        });

        // Action buttons
        egui::TopBottomPanel::bottom("action_panel").show(ctx, |ui| {
            ui.add_enabled_ui(!modal_open, |ui| {
                ui.horizontal(|ui| {
                    if ui.button("Terminate").clicked() {
                        command = Some(Command::Apply(Action::Terminate));
                    }
                    if ui.button("Suspend").clicked() {
                        command = Some(Command::Apply(Action::Suspend));
                    }
                    if ui.button("Resume").clicked() {
                        command = Some(Command::Apply(Action::Resume));
                    }
                    ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
                        if ui.button("🔄 Refresh").clicked() {
                            command = Some(Command::Refresh);
                        }
                        let age = self
                            .table
                            .last_refresh()
                            .map(|at| at.elapsed().as_secs_f32())
                            .unwrap_or_default();
                        ui.label(format!(
                            "Processes: {} | Last refresh: {:.1}s ago",
                            self.table.rows().len(),
                            age
                        ));
                    });
                });
            });
        });

        // Process table
        egui::CentralPanel::default().show(ctx, |ui| {
            ui.add_enabled_ui(!modal_open, |ui| {
                ScrollArea::both().auto_shrink([false, false]).show(ui, |ui| {
                    egui::Grid::new("process_table")
                        .num_columns(5)
                        .spacing([24.0, 4.0])
                        .striped(true)
                        .show(ui, |ui| {
                            for header in ["PID", "Name", "CPU (%)", "Memory (MB)", "Status"] {
                                ui.label(RichText::new(header).strong());
                            }
                            ui.end_row();

                            let selected = self.table.selected();
                            for row in self.table.rows() {
                                let is_selected = selected == Some(row.pid);
                                let cells = [
                                    row.pid.to_string(),
                                    row.name.clone(),
                                    row.cpu.clone(),
                                    row.memory.clone(),
                                    row.status.clone(),
                                ];
                                for cell in cells {
                                    if ui.selectable_label(is_selected, cell).clicked() {
                                        command = Some(Command::Select(row.pid));
                                    }
                                }
                                ui.end_row();
                            }
                        });
                });
            });
        });

        self.show_notification(ctx, &mut command);

        if let Some(command) = command {
            self.execute(command);
        }
    }
}
