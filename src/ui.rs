use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use medsync::{
    Catalog, Label, MedicineCard, Session, ShortlistError, SqliteStore, Tab, TabView,
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState, Wrap},
    Frame, Terminal,
};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Search,
}

pub struct App {
    pub catalog: Catalog,
    pub session: Session,
    store: Option<SqliteStore>,
    /// Set by subscription hooks; cleared after each draw.
    dirty: Arc<AtomicBool>,
    pub state: TableState,
    pub mode: InputMode,
    pub show_detail: bool,
    pub message: Option<String>,
}

impl App {
    pub fn new(catalog: Catalog, session: Session, store: Option<SqliteStore>, dirty: Arc<AtomicBool>) -> Self {
        Self {
            catalog,
            session,
            store,
            dirty,
            state: TableState::default(),
            mode: InputMode::Normal,
            show_detail: false,
            message: None,
        }
    }

    pub fn view(&self) -> TabView {
        self.session.view(&self.catalog, self.session.active_tab())
    }

    fn cards(&self) -> Vec<MedicineCard> {
        match self.view() {
            TabView::List(cards) => cards,
            _ => Vec::new(),
        }
    }

    pub fn selected_card(&self) -> Option<MedicineCard> {
        let i = self.state.selected()?;
        self.cards().into_iter().nth(i)
    }

    /// Check the store for changes; true when a redraw is due.
    pub fn tick(&mut self) -> bool {
        if let Some(store) = &self.store {
            store.poll();
        }
        self.dirty.swap(false, Ordering::SeqCst)
    }

    fn clamp_selection(&mut self) {
        let len = self.cards().len();
        match self.state.selected() {
            _ if len == 0 => self.state.select(None),
            Some(i) if i >= len => self.state.select(Some(len - 1)),
            None => self.state.select(Some(0)),
            _ => {}
        }
    }

    pub fn next_tab(&mut self) {
        self.session.set_active_tab(self.session.active_tab().next());
        self.state.select(None);
        self.show_detail = false;
    }

    pub fn previous_tab(&mut self) {
        self.session.set_active_tab(self.session.active_tab().previous());
        self.state.select(None);
        self.show_detail = false;
    }

    pub fn next(&mut self) {
        let len = self.cards().len();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(i) if i + 1 < len => i + 1,
            _ => 0,
        };
        self.state.select(Some(i));
    }

    pub fn previous(&mut self) {
        let len = self.cards().len();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(0) | None => len - 1,
            Some(i) => i - 1,
        };
        self.state.select(Some(i));
    }

    pub fn add_selected(&mut self) {
        let Some(card) = self.selected_card() else {
            return;
        };
        if !card.show_add {
            return;
        }

        self.message = Some(match self.session.add(&self.catalog, card.collection, &card.id) {
            Ok(true) => format!("+ {}", card.title),
            Ok(false) => format!("= {}", card.title),
            Err(ShortlistError::OutOfStock(_)) => self.session.t(Label::OutOfStock).to_string(),
            Err(err) => err.to_string(),
        });
    }

    pub fn toggle_language(&mut self) {
        let next = self.session.language().toggled();
        self.session.set_language(next);
    }

    pub fn retry(&mut self) {
        self.catalog.retry();
        self.message = None;
    }

    /// Apply one key press. Returns `true` when the app should quit.
    pub fn handle_key(&mut self, key: KeyEvent) -> bool {
        if self.mode == InputMode::Search {
            let tab = self.session.active_tab();
            let mut query = self.session.search(tab).to_string();
            match key.code {
                KeyCode::Enter | KeyCode::Esc => self.mode = InputMode::Normal,
                KeyCode::Backspace => {
                    query.pop();
                }
                KeyCode::Char(c) => query.push(c),
                _ => {}
            }
            self.session.set_search(tab, query);
            self.state.select(None);
            self.clamp_selection();
            return false;
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return true,
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => return true,
            KeyCode::Tab => self.next_tab(),
            KeyCode::BackTab => self.previous_tab(),
            KeyCode::Char('/') => self.mode = InputMode::Search,
            KeyCode::Char('m') => {
                self.session.set_active_tab(Tab::MyMedicines);
                self.state.select(None);
            }
            KeyCode::Char('a') => self.add_selected(),
            KeyCode::Char('l') => self.toggle_language(),
            KeyCode::Char('r') => self.retry(),
            KeyCode::Enter => self.show_detail = !self.show_detail,
            KeyCode::Down | KeyCode::Char('j') => self.next(),
            KeyCode::Up | KeyCode::Char('k') => self.previous(),
            KeyCode::Home => self.state.select(Some(0)),
            KeyCode::End => {
                let len = self.cards().len();
                if len > 0 {
                    self.state.select(Some(len - 1));
                }
            }
            _ => {}
        }
        self.clamp_selection();
        false
    }
}

pub fn run_ui(app: &mut App, tick: Duration) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, app, tick);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    res
}

fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    tick: Duration,
) -> Result<()> {
    let mut redraw = true;
    loop {
        if redraw {
            app.clamp_selection();
            terminal.draw(|f| ui(f, app))?;
        }

        if event::poll(tick)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press && app.handle_key(key) {
                    return Ok(());
                }
            }
            redraw = true;
        } else {
            redraw = app.tick();
        }
    }
}

fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header with tabs
            Constraint::Length(3), // Search box
            Constraint::Min(0),    // Content area
            Constraint::Length(3), // Status bar
        ])
        .split(f.size());

    render_header(f, chunks[0], app);
    render_search(f, chunks[1], app);

    match app.view() {
        TabView::Loading => render_message(f, chunks[2], app.session.t(Label::Loading), None, Color::Cyan),
        TabView::Failed(err) => {
            let detail = format!("{} ({})", app.session.t(Label::ErrorDescription), err);
            render_message(f, chunks[2], app.session.t(Label::ErrorTitle), Some(detail), Color::Red);
        }
        TabView::List(cards) if cards.is_empty() => render_message(
            f,
            chunks[2],
            app.session.t(Label::NoMedicinesFound),
            Some(app.session.t(Label::NoMedicinesDescription).to_string()),
            Color::DarkGray,
        ),
        TabView::List(cards) => {
            if app.show_detail {
                let content_chunks = Layout::default()
                    .direction(Direction::Horizontal)
                    .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
                    .split(chunks[2]);
                let selected = app.state.selected().and_then(|i| cards.get(i)).cloned();
                render_table(f, content_chunks[0], app, &cards);
                render_detail_panel(f, content_chunks[1], app, selected.as_ref());
            } else {
                render_table(f, chunks[2], app, &cards);
            }
        }
    }

    render_status_bar(f, chunks[3], app);
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let active = app.session.active_tab();

    let mut tab_spans = vec![Span::styled(
        format!("{}  ", app.session.t(Label::AppTitle)),
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
    )];
    for (i, tab) in Tab::ALL.iter().enumerate() {
        if i > 0 {
            tab_spans.push(Span::raw(" │ "));
        }

        let style = if *tab == active {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
        } else {
            Style::default().fg(Color::DarkGray)
        };

        let mut title = app.session.t(tab.title()).to_string();
        if *tab == Tab::MyMedicines {
            title = format!("{} ({})", title, app.session.shortlist().len());
        }
        tab_spans.push(Span::styled(title, style));
    }

    tab_spans.push(Span::raw("  |  "));
    tab_spans.push(Span::styled(
        app.session.language().native_name(),
        Style::default().fg(Color::White),
    ));

    let header = Paragraph::new(vec![Line::from(tab_spans)])
        .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::Cyan)));

    f.render_widget(header, area);
}

fn render_search(f: &mut Frame, area: Rect, app: &App) {
    let tab = app.session.active_tab();
    let query = app.session.search(tab);
    let editing = app.mode == InputMode::Search;

    let line = if query.is_empty() && !editing {
        Line::from(Span::styled(
            app.session.t(tab.search_placeholder()),
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        let mut spans = vec![Span::raw(query.to_string())];
        if editing {
            spans.push(Span::styled("▏", Style::default().fg(Color::Yellow)));
        }
        Line::from(spans)
    };

    let border = if editing { Color::Yellow } else { Color::White };
    let search = Paragraph::new(vec![line]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(border))
            .title(" / "),
    );
    f.render_widget(search, area);
}

fn render_message(f: &mut Frame, area: Rect, title: &str, detail: Option<String>, color: Color) {
    let mut content = vec![
        Line::from(""),
        Line::from(Span::styled(
            format!("  {}", title),
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        )),
    ];
    if let Some(detail) = detail {
        content.push(Line::from(""));
        content.push(Line::from(format!("  {}", detail)));
    }

    let paragraph = Paragraph::new(content)
        .wrap(Wrap { trim: false })
        .block(Block::default().borders(Borders::ALL));
    f.render_widget(paragraph, area);
}

fn render_table(f: &mut Frame, area: Rect, app: &mut App, cards: &[MedicineCard]) {
    let first_label = cards
        .first()
        .and_then(|c| c.rows.first())
        .map(|r| r.label.clone())
        .unwrap_or_default();
    let expiry_label = app.session.t(Label::Expiry).to_string();

    let header_cells = [String::new(), first_label, "MRP".to_string(), expiry_label, String::new()]
        .into_iter()
        .map(|h| {
            Cell::from(h).style(
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            )
        });

    let header = Row::new(header_cells)
        .style(Style::default().bg(Color::DarkGray))
        .height(1);

    let rows = cards.iter().map(|card| {
        let stock_color = if card.out_of_stock { Color::Red } else { Color::Green };
        let stock = card.rows.first().map(|r| r.value.clone()).unwrap_or_default();
        let expiry = card.rows.last().map(|r| r.value.clone()).unwrap_or_default();

        let cells = vec![
            Cell::from(truncate(&card.title, 34)),
            Cell::from(stock).style(Style::default().fg(stock_color)),
            Cell::from(card.row("MRP").unwrap_or("-").to_string()),
            Cell::from(expiry),
            Cell::from(truncate(&card.subtitle, 26)).style(Style::default().fg(Color::DarkGray)),
        ];

        Row::new(cells).height(1)
    });

    let title = format!(" {} ", app.session.t(app.session.active_tab().title()));
    let table = Table::new(
        rows,
        [
            Constraint::Length(36),
            Constraint::Length(16),
            Constraint::Length(12),
            Constraint::Length(14),
            Constraint::Min(10),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(title),
    )
    .highlight_style(
        Style::default()
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD),
    )
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.state);
}

fn render_detail_panel(f: &mut Frame, area: Rect, app: &App, card: Option<&MedicineCard>) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow));

    let Some(card) = card else {
        f.render_widget(Paragraph::new("-").block(block), area);
        return;
    };

    let label_style = Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD);
    let mut content = vec![
        Line::from(""),
        Line::from(Span::styled(
            format!("  {}", card.title),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled(
            format!("  {}", card.subtitle),
            Style::default().fg(Color::DarkGray),
        )),
    ];
    if let Some(badge) = &card.badge {
        content.push(Line::from(Span::styled(
            format!("  [{}]", badge),
            Style::default().fg(Color::White).bg(Color::Red),
        )));
    }
    content.push(Line::from(""));

    for row in &card.rows {
        content.push(Line::from(vec![
            Span::styled(format!("  {}: ", row.label), label_style),
            Span::raw(row.value.clone()),
        ]));
    }

    if card.show_add {
        content.push(Line::from(""));
        let style = if card.can_add() {
            Style::default().fg(Color::Green)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        content.push(Line::from(vec![
            Span::styled("  a ", Style::default().fg(Color::Yellow)),
            Span::styled(app.session.t(Label::AddToMyMedicines), style),
        ]));
    }

    let panel = Paragraph::new(content).wrap(Wrap { trim: false }).block(block);
    f.render_widget(panel, area);
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &App) {
    let selected = app.state.selected().map(|i| i + 1).unwrap_or(0);
    let total = app.cards().len();

    let mut status_spans = vec![Span::styled(
        format!(" {}/{} ", selected, total),
        Style::default().fg(Color::Cyan),
    )];

    if let Some(message) = &app.message {
        status_spans.push(Span::raw(" | "));
        status_spans.push(Span::styled(message.clone(), Style::default().fg(Color::Green)));
    }

    let hints: [(&str, &str); 7] = [
        ("/", " Search"),
        ("Tab", " Tab"),
        ("a", " Add"),
        ("Enter", " Details"),
        ("l", " Language"),
        ("r", " Retry"),
        ("m", " My"),
    ];
    for (key, text) in hints {
        status_spans.push(Span::raw(" | "));
        status_spans.push(Span::styled(key, Style::default().fg(Color::Yellow)));
        status_spans.push(Span::raw(text));
    }
    status_spans.push(Span::raw(" | "));
    status_spans.push(Span::styled("q", Style::default().fg(Color::Red)));
    status_spans.push(Span::raw(" Quit"));

    let status_bar = Paragraph::new(vec![Line::from(status_spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );

    f.render_widget(status_bar, area);
}

/// Shorten to `max_len` characters, ending in `...` when cut.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medsync::{Config, Language, MemoryStore};
    use serde_json::json;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn app() -> (Arc<MemoryStore>, App) {
        let store = Arc::new(MemoryStore::new());
        store.set_document(
            "medicine-1",
            "dolo",
            json!({"Product Name": "Dolo 650", "Product Name_kn": "ಡೋಲೊ 650", "Current Stock": 3}),
        );
        store.set_document(
            "medicine-1",
            "zero",
            json!({"Product Name": "Zincovit", "Product Name_kn": "ಜಿಂಕೋವಿಟ್", "Current Stock": 0}),
        );
        let mut catalog = Catalog::new(Some(store.clone()), &Config::default());
        catalog.start();
        let app = App::new(catalog, Session::new(Language::English), None, Arc::new(AtomicBool::new(false)));
        (store, app)
    }

    #[test]
    fn test_truncate_is_char_safe() {
        assert_eq!(truncate("ಡೋಲೊ 650 ಮಾತ್ರೆ", 6), "ಡೋಲ...");
        assert_eq!(truncate("short", 10), "short");
    }

    #[test]
    fn test_search_mode_edits_active_tab_query() {
        let (_store, mut app) = app();
        app.handle_key(key(KeyCode::Char('/')));
        for c in "dolo".chars() {
            app.handle_key(key(KeyCode::Char(c)));
        }
        app.handle_key(key(KeyCode::Enter));

        assert_eq!(app.mode, InputMode::Normal);
        assert_eq!(app.session.search(Tab::Products), "dolo");
        assert_eq!(app.cards().len(), 1);
    }

    #[test]
    fn test_add_and_out_of_stock_message() {
        let (_store, mut app) = app();
        app.handle_key(key(KeyCode::Down));
        assert_eq!(app.selected_card().map(|c| c.id), Some("dolo".to_string()));

        app.handle_key(key(KeyCode::Char('a')));
        assert_eq!(app.session.shortlist().len(), 1);

        app.handle_key(key(KeyCode::Down));
        app.handle_key(key(KeyCode::Char('a')));
        assert_eq!(app.session.shortlist().len(), 1);
        assert_eq!(app.message.as_deref(), Some("Out of Stock"));
    }

    #[test]
    fn test_quit_keys() {
        let (_store, mut app) = app();
        assert!(!app.handle_key(key(KeyCode::Tab)));
        assert_eq!(app.session.active_tab(), Tab::JanAushadhi);
        assert!(app.handle_key(key(KeyCode::Char('q'))));
    }
}
