use anyhow::Result;
use binscope::{
    lookup, truncate_input, BatchEvent, BatchRunner, BinTable, LookupOutcome, RunMode, RunSnapshot,
    RunStatus, Settings, WeightedClassifier,
};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Gauge, List, ListItem, Paragraph, Row, Table},
    Frame, Terminal,
};
use std::collections::VecDeque;
use std::io;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;

const DEMO_ITEMS: usize = 20;
const LOG_LINES: usize = 12;

pub struct App {
    pub table: BinTable,
    pub settings: Settings,
    pub input: String,
    pub outcome: Option<LookupOutcome>,
    pub mode: RunMode,
    pub snapshot: RunSnapshot,
    pub log: VecDeque<String>,
    runner: BatchRunner<String, WeightedClassifier>,
    events: UnboundedReceiver<BatchEvent>,
}

impl App {
    pub fn new(table: BinTable, settings: Settings) -> Result<Self> {
        let mode = RunMode::Standard;
        let (runner, events) =
            BatchRunner::new(settings.classifier.build(mode), settings.runner_config())?;
        let snapshot = runner.snapshot();

        Ok(Self {
            table,
            settings,
            input: String::new(),
            outcome: None,
            mode,
            snapshot,
            log: VecDeque::new(),
            runner,
            events,
        })
    }

    fn push_log(&mut self, line: String) {
        if self.log.len() == LOG_LINES {
            self.log.pop_front();
        }
        self.log.push_back(line);
    }

    pub fn type_char(&mut self, c: char) {
        let mut next = self.input.clone();
        next.push(c);
        self.input = truncate_input(&next, self.table.bounds());
    }

    pub fn backspace(&mut self) {
        self.input.pop();
    }

    pub fn run_lookup(&mut self) {
        let outcome = lookup(&self.table, &self.input);
        let line = match &outcome {
            LookupOutcome::Found { record } => format!("lookup {} → {}", record.bin, record.bank),
            LookupOutcome::NotFound { query } => format!("lookup {} → not found", query),
            LookupOutcome::Rejected { reason } => reason.clone(),
        };
        self.push_log(line);
        self.outcome = Some(outcome);
    }

    /// Rebuild the runner so the classifier matches the selected mode
    pub fn toggle_mode(&mut self) {
        if self.snapshot.status == RunStatus::Running {
            self.push_log("stop the run before switching mode".to_string());
            return;
        }

        let mode = match self.mode {
            RunMode::Standard => RunMode::Enhanced,
            RunMode::Enhanced => RunMode::Standard,
        };

        match BatchRunner::new(self.settings.classifier.build(mode), self.settings.runner_config()) {
            Ok((runner, events)) => {
                self.runner = runner;
                self.events = events;
                self.mode = mode;
                self.snapshot = self.runner.snapshot();
                self.push_log(format!("mode: {}", mode.as_str()));
            }
            Err(e) => self.push_log(e.to_string()),
        }
    }

    pub fn start_batch(&mut self) {
        let items: Vec<String> = (1..=DEMO_ITEMS).map(|i| format!("item-{:03}", i)).collect();
        match self.runner.start_in_mode(items, self.mode) {
            Ok(run_id) => self.push_log(format!("run {} started", short_id(&run_id.to_string()))),
            Err(e) => self.push_log(e.to_string()),
        }
        self.snapshot = self.runner.snapshot();
    }

    pub fn stop_batch(&mut self) {
        self.runner.stop();
        self.drain_events();
    }

    pub fn reset_batch(&mut self) {
        if let Err(e) = self.runner.reset() {
            self.push_log(e.to_string());
        }
        self.snapshot = self.runner.snapshot();
    }

    pub fn drain_events(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            match &event {
                BatchEvent::Progress { processed, total, result, .. } => {
                    self.push_log(format!("[{}/{}] {}", processed, total, result.category));
                }
                BatchEvent::Completed { tallies, .. } => {
                    self.push_log(format!("completed: {} processed", tallies.total()));
                }
                BatchEvent::Stopped { cursor, .. } => {
                    self.push_log(format!("stopped after {}", cursor));
                }
                BatchEvent::Failed { error, .. } => {
                    self.push_log(format!("failed: {}", error));
                }
            }
        }
        self.snapshot = self.runner.snapshot();
    }
}

fn short_id(id: &str) -> &str {
    &id[..8.min(id.len())]
}

pub fn run_ui(app: &mut App) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run the app
    let res = run_app(&mut terminal, app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        println!("Error: {:?}", err);
    }

    Ok(())
}

fn run_app<B: ratatui::backend::Backend>(terminal: &mut Terminal<B>, app: &mut App) -> io::Result<()> {
    loop {
        app.drain_events();
        terminal.draw(|f| ui(f, app))?;

        // Poll so progress keeps redrawing while no key is pressed
        if !event::poll(Duration::from_millis(100))? {
            continue;
        }

        if let Event::Key(key) = event::read()? {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            match key.code {
                KeyCode::Char('q') | KeyCode::Esc => {
                    app.runner.stop();
                    return Ok(());
                }
                KeyCode::Char(c) if c.is_ascii_digit() => app.type_char(c),
                KeyCode::Backspace => app.backspace(),
                KeyCode::Enter => app.run_lookup(),
                KeyCode::Char('s') => app.start_batch(),
                KeyCode::Char('x') => app.stop_batch(),
                KeyCode::Char('r') => app.reset_batch(),
                KeyCode::Char('m') => app.toggle_mode(),
                _ => {}
            }
        }
    }
}

fn ui(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(0),    // Panels
            Constraint::Length(3), // Status bar
        ])
        .split(f.size());

    render_header(f, chunks[0], app);

    let panels = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(chunks[1]);

    render_lookup(f, panels[0], app);
    render_batch(f, panels[1], app);
    render_status_bar(f, chunks[2]);
}

fn status_style(status: RunStatus) -> Style {
    match status {
        RunStatus::Idle => Style::default().fg(Color::DarkGray),
        RunStatus::Running => Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
        RunStatus::Stopped => Style::default().fg(Color::Yellow),
    }
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let spans = vec![
        Span::styled("BIN Scope", Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
        Span::raw("  |  "),
        Span::styled(format!("{} BINs", app.table.len()), Style::default().fg(Color::White)),
        Span::raw("  |  "),
        Span::styled(format!("Mode: {}", app.mode.as_str()), Style::default().fg(Color::Magenta)),
        Span::raw("  |  "),
        Span::styled(format!("{:?}", app.snapshot.status), status_style(app.snapshot.status)),
    ];

    let header = Paragraph::new(vec![Line::from(spans)])
        .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::Cyan)));

    f.render_widget(header, area);
}

fn render_lookup(f: &mut Frame, area: Rect, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0)])
        .split(area);

    let bounds = app.table.bounds();
    let input = Paragraph::new(Line::from(vec![
        Span::styled(app.input.clone(), Style::default().fg(Color::Yellow)),
        Span::styled("▏", Style::default().fg(Color::DarkGray)),
    ]))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .title(format!(" BIN ({}-{} digits) ", bounds.min_len, bounds.max_len)),
    );
    f.render_widget(input, chunks[0]);

    let block = Block::default().borders(Borders::ALL).title(" Result ");

    match &app.outcome {
        Some(LookupOutcome::Found { record }) => {
            let fields = [
                ("BIN", record.bin.as_str()),
                ("Brand", record.brand.as_str()),
                ("Type", record.card_type.as_str()),
                ("Level", record.level.as_str()),
                ("Bank", record.bank.as_str()),
                ("Country", record.country.as_str()),
                ("Currency", record.currency.as_str()),
                ("Prepaid", record.prepaid.as_str()),
            ];
            let rows = fields.iter().map(|(label, value)| {
                Row::new(vec![
                    Cell::from(*label).style(Style::default().fg(Color::Cyan)),
                    Cell::from(*value),
                ])
            });
            let table = Table::new(rows, [Constraint::Length(10), Constraint::Min(10)]).block(block);
            f.render_widget(table, chunks[1]);
        }
        Some(LookupOutcome::NotFound { query }) => {
            let text = Paragraph::new(format!("BIN {} not found in database", query))
                .style(Style::default().fg(Color::Red))
                .block(block);
            f.render_widget(text, chunks[1]);
        }
        Some(LookupOutcome::Rejected { reason }) => {
            let text = Paragraph::new(reason.as_str())
                .style(Style::default().fg(Color::Red))
                .block(block);
            f.render_widget(text, chunks[1]);
        }
        None => {
            let text = Paragraph::new("Type a BIN and press Enter")
                .style(Style::default().fg(Color::DarkGray))
                .block(block);
            f.render_widget(text, chunks[1]);
        }
    }
}

fn render_batch(f: &mut Frame, area: Rect, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Gauge
            Constraint::Length(4), // Tallies
            Constraint::Min(0),    // Event log
        ])
        .split(area);

    let snapshot = &app.snapshot;
    let gauge = Gauge::default()
        .block(Block::default().borders(Borders::ALL).title(" Progress "))
        .gauge_style(Style::default().fg(Color::Green))
        .percent(snapshot.percent().round().clamp(0.0, 100.0) as u16)
        .label(format!("{}/{}", snapshot.cursor, snapshot.total));
    f.render_widget(gauge, chunks[0]);

    let palette = [Color::Green, Color::Red, Color::Yellow, Color::Cyan];
    let mut spans = Vec::new();
    for (i, tally) in snapshot.tallies.iter().enumerate() {
        if i > 0 {
            spans.push(Span::raw("   "));
        }
        spans.push(Span::styled(
            format!("{}: {}", tally.category, tally.count),
            Style::default().fg(palette[i % palette.len()]).add_modifier(Modifier::BOLD),
        ));
    }
    let tallies = Paragraph::new(vec![Line::from(spans)])
        .block(Block::default().borders(Borders::ALL).title(" Tallies "));
    f.render_widget(tallies, chunks[1]);

    let items: Vec<ListItem> = app.log.iter().map(|line| ListItem::new(line.as_str())).collect();
    let log = List::new(items).block(Block::default().borders(Borders::ALL).title(" Events "));
    f.render_widget(log, chunks[2]);
}

fn render_status_bar(f: &mut Frame, area: Rect) {
    let key = |k: &'static str| Span::styled(k, Style::default().fg(Color::Yellow));

    let spans = vec![
        key(" 0-9"),
        Span::raw(" BIN | "),
        key("Enter"),
        Span::raw(" Lookup | "),
        key("s"),
        Span::raw(" Start | "),
        key("x"),
        Span::raw(" Stop | "),
        key("r"),
        Span::raw(" Reset | "),
        key("m"),
        Span::raw(" Mode | "),
        Span::styled("q", Style::default().fg(Color::Red)),
        Span::raw(" Quit"),
    ];

    let status_bar = Paragraph::new(vec![Line::from(spans)])
        .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::White)));

    f.render_widget(status_bar, area);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app() -> App {
        App::new(BinTable::seeded(), Settings::default()).unwrap()
    }

    #[test]
    fn test_typing_is_truncated_to_max_len() {
        let mut app = app();
        for c in "4000009912".chars() {
            app.type_char(c);
        }
        assert_eq!(app.input, "40000099");

        app.backspace();
        assert_eq!(app.input, "4000009");
    }

    #[test]
    fn test_lookup_updates_outcome_and_log() {
        let mut app = app();
        for c in "424242".chars() {
            app.type_char(c);
        }
        app.run_lookup();

        assert!(app.outcome.as_ref().unwrap().is_found());
        assert_eq!(app.log.back().unwrap(), "lookup 424242 → Test Bank");
    }

    #[test]
    fn test_log_is_bounded() {
        let mut app = app();
        for i in 0..(LOG_LINES + 5) {
            app.push_log(format!("line {}", i));
        }
        assert_eq!(app.log.len(), LOG_LINES);
        assert_eq!(app.log.front().unwrap(), "line 5");
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_stop_and_mode_toggle() {
        let mut app = app();

        app.start_batch();
        assert_eq!(app.snapshot.status, RunStatus::Running);
        assert_eq!(app.snapshot.total, DEMO_ITEMS);

        app.toggle_mode();
        assert_eq!(app.mode, RunMode::Standard);

        app.stop_batch();
        assert_eq!(app.snapshot.status, RunStatus::Stopped);
        assert_eq!(app.log.back().unwrap(), "stopped after 0");

        app.toggle_mode();
        assert_eq!(app.mode, RunMode::Enhanced);
        assert_eq!(app.snapshot.status, RunStatus::Idle);
    }
}
