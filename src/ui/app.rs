use anyhow::{Context, Result};
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
    KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};
use crossterm::execute;
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen};
use ratatui::backend::{Backend, CrosstermBackend};
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};
use ratatui::{Frame, Terminal};
use std::io::stdout;
use std::ops::Range;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::api_client::SyncClient;
use crate::config::Config;
use crate::data::columns::{build_columns, course_groups, group_checkboxes, ColumnDef, ColumnVisibility};
use crate::data::records::{CourseGroup, Division};
use crate::data::store::ScheduleStore;
use crate::dragdrop::{DragDropCoordinator, DragState};
use crate::error::{ErrorKind, GridError};
use crate::prefs::PreferenceStore;
use crate::services::{SyncEvent, SyncService};
use crate::ui::grid_panel::{panel_title, GridPanel};
use crate::ui::table_renderer::{render_panel, Hit, HitMap, PanelRenderContext};
use crate::utils::logging::{get_log_buffer, LogRingBuffer};

const LOG_PANEL_HEIGHT: u16 = 10;
const WHEEL_LINES: i64 = 3;

/// Where the left button went down; a drag only starts once the pointer moves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PressOrigin {
    panel: usize,
    row: usize,
    column: usize,
}

pub struct SchedulerApp {
    config: Config,
    store: ScheduleStore,
    columns: Vec<ColumnDef>,
    visibility: ColumnVisibility,
    panels: Vec<GridPanel>,
    focus: usize,
    coordinator: DragDropCoordinator,
    sync: SyncService,
    prefs: PreferenceStore,
    log_buffer: Option<LogRingBuffer>,

    /// Blocking notice; input is swallowed until it is dismissed
    notice: Option<String>,
    status: String,
    show_logs: bool,
    should_quit: bool,

    panel_hits: Vec<HitMap>,
    group_hits: Vec<(Range<u16>, CourseGroup)>,
    group_bar_y: u16,
    press_origin: Option<PressOrigin>,
}

impl SchedulerApp {
    pub fn new(config: Config, client: Arc<dyn SyncClient>, prefs: PreferenceStore) -> Result<Self> {
        let panels = [Division::MS, Division::HS]
            .into_iter()
            .map(|division| {
                let collapsed = prefs.is_collapsed(panel_title(division));
                GridPanel::new(division, &config.display, collapsed)
            })
            .collect();

        Ok(Self {
            coordinator: DragDropCoordinator::new(config.behavior.enforce_capacity),
            sync: SyncService::new(client)?,
            store: ScheduleStore::new(),
            columns: build_columns(&[]),
            visibility: ColumnVisibility::new(),
            panels,
            focus: 0,
            prefs,
            log_buffer: get_log_buffer(),
            notice: None,
            status: "Loading...".to_string(),
            show_logs: false,
            should_quit: false,
            panel_hits: Vec::new(),
            group_hits: Vec::new(),
            group_bar_y: 0,
            press_origin: None,
            config,
        })
    }

    pub fn store(&self) -> &ScheduleStore {
        &self.store
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn panel(&self, division: Division) -> Option<&GridPanel> {
        self.panels.iter().find(|p| p.division() == division)
    }

    pub fn drag_state(&self) -> &DragState {
        self.coordinator.state()
    }

    pub fn visibility(&self) -> &ColumnVisibility {
        &self.visibility
    }

    pub fn visible_columns(&self) -> Vec<&ColumnDef> {
        self.visibility.visible_columns(&self.columns)
    }

    /// Main run loop
    pub fn run<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> Result<()> {
        self.sync.refresh_all();
        loop {
            self.pump_sync();
            terminal.draw(|f| self.draw(f))?;

            if event::poll(Duration::from_millis(100))? {
                match event::read()? {
                    Event::Key(key) if key.kind == KeyEventKind::Press => {
                        self.handle_key_event(key);
                    }
                    Event::Mouse(mouse) => self.handle_mouse_event(mouse),
                    _ => {}
                }
            }

            if self.should_quit {
                break;
            }
        }
        Ok(())
    }

    /// Apply every finished background call; returns how many were applied
    pub fn pump_sync(&mut self) -> usize {
        let events = self.sync.poll();
        let count = events.len();
        for event in events {
            self.apply_sync_event(event);
        }
        count
    }

    pub fn request_refresh(&mut self) {
        self.status = "Refreshing...".to_string();
        self.sync.refresh_all();
    }

    fn apply_sync_event(&mut self, event: SyncEvent) {
        match event {
            SyncEvent::CoursesLoaded(Ok(courses)) => {
                let snapshot = self.store.replace_courses(courses);
                self.columns = build_columns(&snapshot.courses);
                self.status = format!("{} courses loaded", snapshot.courses.len());
            }
            SyncEvent::TeachersLoaded(Ok(teachers)) => {
                let snapshot = self.store.replace_teachers(teachers);
                self.status = format!("{} teachers loaded", snapshot.teachers.len());
            }
            SyncEvent::CoursesLoaded(Err(e)) | SyncEvent::TeachersLoaded(Err(e)) => {
                warn!(target: "app", "{}", e);
                self.status = e.notice();
            }
            SyncEvent::Persisted(outcome) => {
                let change_id = outcome.change_id;
                let partial = outcome.is_partial();
                match self.coordinator.finish(&mut self.store, outcome) {
                    Ok(_) => {
                        self.status = format!("Saved change #{}", change_id);
                        if self.config.behavior.refetch_after_commit {
                            self.sync.fetch_teachers();
                        }
                    }
                    Err(e) => {
                        self.report(&e);
                        if partial {
                            warn!(target: "app", "change #{} partly saved, reloading teachers", change_id);
                            self.sync.fetch_teachers();
                        }
                    }
                }
            }
        }
        self.refresh_panels();
    }

    fn refresh_panels(&mut self) {
        let snapshot = self.store.current();
        for panel in &mut self.panels {
            panel.refresh(&snapshot, &self.columns, &self.visibility);
        }
    }

    /// Surface a failure as a blocking notice
    fn report(&mut self, error: &GridError) {
        match error.kind() {
            ErrorKind::Network => warn!(target: "app", "notice for: {}", error),
            ErrorKind::Validation | ErrorKind::MalformedPayload => {
                debug!(target: "app", "notice for: {}", error)
            }
        }
        self.notice = Some(error.notice());
    }

    fn focused(&self) -> Option<&GridPanel> {
        self.panels.get(self.focus)
    }

    fn focused_mut(&mut self) -> Option<&mut GridPanel> {
        self.panels.get_mut(self.focus)
    }

    /// Handle keyboard input; returns true when the app should quit
    pub fn handle_key_event(&mut self, key: KeyEvent) -> bool {
        if self.notice.is_some() {
            if matches!(key.code, KeyCode::Enter | KeyCode::Esc | KeyCode::Char(' ')) {
                self.notice = None;
            }
            return false;
        }

        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.should_quit = true
            }
            KeyCode::Esc => self.coordinator.cancel(),
            KeyCode::Tab | KeyCode::BackTab => {
                self.focus = (self.focus + 1) % self.panels.len();
            }
            KeyCode::Up => self.move_cursor(-1, 0),
            KeyCode::Down => self.move_cursor(1, 0),
            KeyCode::Left => self.move_cursor(0, -1),
            KeyCode::Right => self.move_cursor(0, 1),
            KeyCode::PageUp => {
                if let Some(panel) = self.focused_mut() {
                    panel.page(false);
                }
            }
            KeyCode::PageDown => {
                if let Some(panel) = self.focused_mut() {
                    panel.page(true);
                }
            }
            KeyCode::Char('s') => self.sort_current_column(),
            KeyCode::Char(' ') => self.pick_up_or_drop(),
            KeyCode::Char('c') => self.toggle_collapse(self.focus),
            KeyCode::Char('r') => self.request_refresh(),
            KeyCode::Char(digit @ '1'..='9') => {
                let index = digit as usize - '1' as usize;
                if let Some(group) = course_groups(&self.columns).get(index).copied() {
                    self.toggle_group(group);
                }
            }
            KeyCode::F(5) => self.show_logs = !self.show_logs,
            _ => {}
        }
        self.should_quit
    }

    fn move_cursor(&mut self, rows: i64, cols: i64) {
        if let Some(panel) = self.focused_mut() {
            if !panel.is_collapsed() {
                panel.move_cursor(rows, cols);
            }
        }
    }

    fn sort_current_column(&mut self) {
        let Some(panel) = self.focused() else { return };
        let column_index = panel.cursor_col();
        self.sort_panel_by(self.focus, column_index);
    }

    /// Header toggle on the `column_index`-th visible column of a panel
    fn sort_panel_by(&mut self, panel_index: usize, column_index: usize) {
        let Some(column) = self.visible_columns().get(column_index).map(|c| (*c).clone()) else {
            return;
        };
        let snapshot = self.store.current();
        let Some(panel) = self.panels.get_mut(panel_index) else { return };
        if panel.toggle_sort(&column) {
            panel.refresh(&snapshot, &self.columns, &self.visibility);
        } else {
            self.status = format!("'{}' is not sortable", column.header);
        }
    }

    pub fn toggle_group(&mut self, group: CourseGroup) {
        let visible = self.visibility.toggle_group(&self.columns, group);
        info!(target: "app", "group {} {}", group, if visible { "shown" } else { "hidden" });
        self.refresh_panels();
    }

    fn toggle_collapse(&mut self, panel_index: usize) {
        let Some(panel) = self.panels.get_mut(panel_index) else { return };
        let collapsed = !panel.is_collapsed();
        panel.set_collapsed(collapsed);
        let title = panel.title();
        if let Err(e) = self.prefs.set_collapsed(title, collapsed) {
            warn!(target: "prefs", "could not save collapse state: {:#}", e);
        }
    }

    /// Space: pick up the course under the cursor, or drop the carried one there
    fn pick_up_or_drop(&mut self) {
        let Some((row, column)) = self
            .focused()
            .and_then(|p| p.cursor_row().map(|row| (row, p.cursor_col())))
        else {
            return;
        };
        if self.coordinator.carried().is_some() {
            self.drop_at(self.focus, row, column);
        } else {
            self.pick_up_at(self.focus, row, column);
        }
    }

    fn pick_up_at(&mut self, panel_index: usize, row: usize, column: usize) {
        let Some(panel) = self.panels.get(panel_index) else { return };
        let Some(display_row) = panel.row(row) else { return };
        let Some(cell) = display_row.cells.get(column) else { return };

        let snapshot = self.store.current();
        let result = match snapshot.teacher(&display_row.key) {
            Some(source) => self
                .coordinator
                .begin_drag(source, cell)
                .map(|payload| format!("Carrying {} from {}", payload.course_id, payload.source.name)),
            None => Err(GridError::UnknownTeacher(display_row.key.clone())),
        };
        match result {
            Ok(status) => self.status = status,
            Err(GridError::NotCourseColumn(_)) | Err(GridError::NothingToMove { .. }) => {
                // empty or non-course cells are simply not draggable
                self.status = "Nothing to pick up here".to_string();
            }
            Err(e) => self.report(&e),
        }
    }

    fn drop_at(&mut self, panel_index: usize, row: usize, column: usize) {
        let target = self.panels.get(panel_index).and_then(|panel| {
            panel
                .row(row)
                .and_then(|r| r.cells.get(column).map(|cell| (r.key.clone(), cell.column_id.clone())))
        });
        let Some((target_id, column_id)) = target else {
            self.coordinator.cancel();
            return;
        };

        match self.coordinator.drop_on(&mut self.store, &target_id, &column_id) {
            Ok(job) => {
                self.status = format!("Saving change #{}...", job.change_id);
                self.sync.persist(job);
            }
            Err(e) => self.report(&e),
        }
        self.refresh_panels();
    }

    pub fn handle_mouse_event(&mut self, mouse: MouseEvent) {
        if self.notice.is_some() {
            if let MouseEventKind::Down(MouseButton::Left) = mouse.kind {
                self.notice = None;
            }
            return;
        }

        let (x, y) = (mouse.column, mouse.row);
        let target = self
            .panel_hits
            .iter()
            .enumerate()
            .find_map(|(idx, hits)| hits.hit(x, y).map(|hit| (idx, hit)));

        match mouse.kind {
            MouseEventKind::ScrollDown | MouseEventKind::ScrollUp => {
                let lines = if mouse.kind == MouseEventKind::ScrollDown {
                    WHEEL_LINES
                } else {
                    -WHEEL_LINES
                };
                let under = self.panel_hits.iter().position(|hits| hits.contains(x, y));
                if let Some(panel) = under.and_then(|idx| self.panels.get_mut(idx)) {
                    panel.scroll_by(lines);
                }
            }
            MouseEventKind::Down(MouseButton::Left) => {
                self.press_origin = None;
                if y == self.group_bar_y {
                    let group = self
                        .group_hits
                        .iter()
                        .find(|(range, _)| range.contains(&x))
                        .map(|(_, group)| *group);
                    if let Some(group) = group {
                        self.toggle_group(group);
                    }
                    return;
                }
                match target {
                    Some((panel, Hit::Title)) => {
                        self.focus = panel;
                        self.toggle_collapse(panel);
                    }
                    Some((panel, Hit::Header { column })) => {
                        self.focus = panel;
                        self.sort_panel_by(panel, column);
                    }
                    Some((panel, Hit::Cell { row, column })) => {
                        self.focus = panel;
                        if let Some(p) = self.panels.get_mut(panel) {
                            p.set_cursor(row, column);
                        }
                        self.press_origin = Some(PressOrigin { panel, row, column });
                    }
                    None => {}
                }
            }
            MouseEventKind::Drag(MouseButton::Left) => {
                if let Some(origin) = self.press_origin.take() {
                    if self.coordinator.is_idle() {
                        self.pick_up_at(origin.panel, origin.row, origin.column);
                    } else if self.coordinator.is_persisting() {
                        self.report(&GridError::Busy);
                    }
                }
            }
            MouseEventKind::Up(MouseButton::Left) => {
                self.press_origin = None;
                if self.coordinator.carried().is_none() {
                    return;
                }
                match target {
                    Some((panel, Hit::Cell { row, column })) => self.drop_at(panel, row, column),
                    _ => {
                        self.coordinator.cancel();
                        self.status = "Drag cancelled".to_string();
                    }
                }
            }
            _ => {}
        }
    }

    pub fn draw(&mut self, f: &mut Frame) {
        let size = f.area();

        let mut constraints = vec![Constraint::Length(1), Constraint::Min(3)];
        if self.show_logs {
            constraints.push(Constraint::Length(LOG_PANEL_HEIGHT));
        }
        constraints.extend([Constraint::Length(1), Constraint::Length(1)]);
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints(constraints)
            .split(size);

        self.draw_group_bar(f, chunks[0]);
        self.draw_panels(f, chunks[1]);
        let mut next = 2;
        if self.show_logs {
            self.draw_log_panel(f, chunks[next]);
            next += 1;
        }
        self.draw_status_line(f, chunks[next]);

        let help = Paragraph::new(self.help_text()).style(Style::default().fg(Color::DarkGray));
        f.render_widget(help, chunks[next + 1]);

        if let Some(notice) = &self.notice {
            draw_notice(f, notice);
        }
    }

    fn draw_group_bar(&mut self, f: &mut Frame, area: Rect) {
        self.group_bar_y = area.y;
        self.group_hits.clear();

        let glyphs = self.config.display.use_glyphs;
        let mut spans = vec![Span::styled("Groups ", Style::default().add_modifier(Modifier::BOLD))];
        let mut x = area.x + 7;
        for (idx, checkbox) in group_checkboxes(&self.columns, &self.visibility).iter().enumerate() {
            let mark = match (checkbox.checked, glyphs) {
                (true, true) => "☑",
                (false, true) => "☐",
                (true, false) => "[x]",
                (false, false) => "[ ]",
            };
            let (r, g, b) = checkbox.group.color();
            let label = format!(" {} {}:{} ", mark, idx + 1, checkbox.group.label());
            let width = label.chars().count() as u16;
            self.group_hits.push((x..x + width, checkbox.group));
            x += width + 1;
            spans.push(Span::styled(
                label,
                Style::default().bg(Color::Rgb(r, g, b)).fg(Color::Black),
            ));
            spans.push(Span::raw(" "));
        }
        f.render_widget(Paragraph::new(Line::from(spans)), area);
    }

    fn draw_panels(&mut self, f: &mut Frame, area: Rect) {
        let percent = self.config.display.panel_height_percent.clamp(10, 100);
        let mut constraints: Vec<Constraint> = self
            .panels
            .iter()
            .map(|p| {
                if p.is_collapsed() {
                    Constraint::Length(1)
                } else {
                    Constraint::Percentage(percent)
                }
            })
            .collect();
        constraints.push(Constraint::Min(0));
        let areas = Layout::default()
            .direction(Direction::Vertical)
            .constraints(constraints)
            .split(area);

        let visible = self.visibility.visible_columns(&self.columns);
        let carried = self
            .coordinator
            .carried()
            .map(|p| (p.source.id.as_str(), p.course_id.as_str()));

        self.panel_hits.clear();
        for (idx, panel) in self.panels.iter_mut().enumerate() {
            let ctx = PanelRenderContext {
                columns: visible.clone(),
                focused: idx == self.focus,
                carried,
                use_glyphs: self.config.display.use_glyphs,
                course_width: self.config.display.course_column_width,
            };
            self.panel_hits.push(render_panel(f, areas[idx], panel, &ctx));
        }
    }

    fn draw_log_panel(&self, f: &mut Frame, area: Rect) {
        let lines: Vec<Line> = self
            .log_buffer
            .as_ref()
            .map(|buffer| buffer.get_recent(area.height.saturating_sub(2) as usize))
            .unwrap_or_default()
            .into_iter()
            .map(|entry| {
                let color = match entry.level.as_str() {
                    "ERROR" => Color::Red,
                    "WARN" => Color::Yellow,
                    "DEBUG" | "TRACE" => Color::DarkGray,
                    _ => Color::Gray,
                };
                Line::styled(entry.format_for_display(), Style::default().fg(color))
            })
            .collect();
        let logs = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Logs (F5)"));
        f.render_widget(logs, area);
    }

    fn draw_status_line(&self, f: &mut Frame, area: Rect) {
        let drag = match self.coordinator.state() {
            DragState::Idle => "Idle".to_string(),
            DragState::Carrying(payload) => format!("Carrying {}", payload.course_id),
            DragState::Persisting { change_id, .. } => format!("Saving #{}", change_id),
        };
        let counts = self
            .panels
            .iter()
            .map(|p| format!("{} {}", p.division(), p.rows().len()))
            .collect::<Vec<_>>()
            .join(" | ");
        let right = format!(
            "{} | v{} | in flight {}",
            counts,
            self.store.current().version,
            self.sync.in_flight()
        );

        let halves = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
            .split(area);
        f.render_widget(
            Paragraph::new(format!("[{}] {}", drag, self.status)).style(Style::default().fg(Color::Cyan)),
            halves[0],
        );
        f.render_widget(
            Paragraph::new(right).alignment(Alignment::Right),
            halves[1],
        );
    }

    fn help_text(&self) -> &'static str {
        match self.coordinator.state() {
            DragState::Carrying(_) => "Space/release: Drop on the same course column | Esc: Cancel",
            _ => "↑↓←→: Move | Space/drag: Pick up | s: Sort | 1-9: Groups | c: Collapse | Tab: Panel | r: Reload | F5: Logs | q: Quit",
        }
    }
}

fn draw_notice(f: &mut Frame, message: &str) {
    let size = f.area();
    let area = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage(40),
            Constraint::Length(5),
            Constraint::Percentage(40),
        ])
        .split(size)[1];
    let area = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(30),
            Constraint::Percentage(40),
            Constraint::Percentage(30),
        ])
        .split(area)[1];

    let notice = Paragraph::new(format!("{}\n\nEnter to dismiss", message))
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Notice")
                .style(Style::default().fg(Color::Yellow)),
        );
    f.render_widget(Clear, area);
    f.render_widget(notice, area);
}

/// Set up the terminal, run `app` until it quits, and restore the terminal
pub fn run_tui(mut app: SchedulerApp) -> Result<()> {
    enable_raw_mode().context("Failed to enable raw mode")?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)
        .context("Failed to enter alternate screen")?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("Failed to create terminal")?;

    let result = app.run(&mut terminal);

    disable_raw_mode().context("Failed to disable raw mode")?;
    execute!(terminal.backend_mut(), DisableMouseCapture, LeaveAlternateScreen)
        .context("Failed to leave alternate screen")?;
    terminal.show_cursor().context("Failed to restore cursor")?;

    result.context("TUI execution failed")
}
