use anyhow::Result;
use covenant_enforcement::money::format_money;
use covenant_enforcement::{
    DashboardSummary, DeadlineBucket, DeadlineEntry, DeadlineStatus, ParcelFigures, ParcelStatus,
    Ranking,
};
use crossterm::{
    event::{self, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame, Terminal,
};
use std::io;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Summary,
    Parcels,
    Priority,
    Deadlines,
}

impl Page {
    pub fn next(&self) -> Self {
        match self {
            Page::Summary => Page::Parcels,
            Page::Parcels => Page::Priority,
            Page::Priority => Page::Deadlines,
            Page::Deadlines => Page::Summary,
        }
    }

    pub fn previous(&self) -> Self {
        match self {
            Page::Summary => Page::Deadlines,
            Page::Parcels => Page::Summary,
            Page::Priority => Page::Parcels,
            Page::Deadlines => Page::Priority,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Page::Summary => "Summary",
            Page::Parcels => "Parcels",
            Page::Priority => "Priority",
            Page::Deadlines => "Deadlines",
        }
    }
}

const PAGES: [Page; 4] = [Page::Summary, Page::Parcels, Page::Priority, Page::Deadlines];

pub struct App {
    pub summary: DashboardSummary,
    pub ranking: Ranking,
    pub figures: Vec<ParcelFigures>,
    pub visible: Vec<ParcelFigures>,
    pub board: Vec<DeadlineEntry>,
    pub status_filter: Option<ParcelStatus>,
    pub current_page: Page,
    pub parcels_state: TableState,
    pub priority_state: TableState,
    pub deadlines_state: TableState,
    pub show_detail: bool,
}

impl App {
    pub fn new(
        summary: DashboardSummary,
        ranking: Ranking,
        figures: Vec<ParcelFigures>,
        board: Vec<DeadlineEntry>,
    ) -> Self {
        let first = |len: usize| {
            let mut state = TableState::default();
            if len > 0 {
                state.select(Some(0));
            }
            state
        };

        Self {
            parcels_state: first(figures.len()),
            priority_state: first(ranking.len()),
            deadlines_state: first(board.len()),
            visible: figures.clone(),
            summary,
            ranking,
            figures,
            board,
            status_filter: None,
            current_page: Page::Summary,
            show_detail: false,
        }
    }

    pub fn toggle_detail(&mut self) {
        self.show_detail = !self.show_detail;
    }

    pub fn selected_parcel(&self) -> Option<&ParcelFigures> {
        self.parcels_state.selected().and_then(|i| self.visible.get(i))
    }

    /// Show only parcels in `status`, or all of them for `None`
    pub fn filter_status(&mut self, status: Option<ParcelStatus>) {
        self.status_filter = status;
        self.visible = self
            .figures
            .iter()
            .filter(|f| status.map_or(true, |s| f.status == s))
            .cloned()
            .collect();

        let selection = if self.visible.is_empty() { None } else { Some(0) };
        self.parcels_state.select(selection);
    }

    pub fn next_page(&mut self) {
        self.current_page = self.current_page.next();
    }

    pub fn previous_page(&mut self) {
        self.current_page = self.current_page.previous();
    }

    fn active_table(&mut self) -> Option<(&mut TableState, usize)> {
        match self.current_page {
            Page::Summary => None,
            Page::Parcels => Some((&mut self.parcels_state, self.visible.len())),
            Page::Priority => Some((&mut self.priority_state, self.ranking.len())),
            Page::Deadlines => Some((&mut self.deadlines_state, self.board.len())),
        }
    }

    /// Move the selection on the current page by `delta` rows, clamped at both ends.
    /// Single steps wrap around.
    pub fn move_selection(&mut self, delta: isize) {
        let Some((state, len)) = self.active_table() else {
            return;
        };
        if len == 0 {
            return;
        }
        let current = state.selected().unwrap_or(0) as isize;
        let last = len as isize - 1;
        let target = match delta {
            1 if current == last => 0,
            -1 if current == 0 => last,
            _ => (current + delta).clamp(0, last),
        };
        state.select(Some(target as usize));
    }

    pub fn select_first(&mut self) {
        if let Some((state, len)) = self.active_table() {
            if len > 0 {
                state.select(Some(0));
            }
        }
    }

    pub fn select_last(&mut self) {
        if let Some((state, len)) = self.active_table() {
            if len > 0 {
                state.select(Some(len - 1));
            }
        }
    }
}

pub fn run_ui(app: &mut App) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

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
        terminal.draw(|f| ui(f, app))?;

        if let Event::Key(key) = event::read()? {
            match key.code {
                KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                KeyCode::Enter if app.current_page == Page::Parcels => app.toggle_detail(),
                KeyCode::Tab => app.next_page(),
                KeyCode::BackTab => app.previous_page(),
                KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => return Ok(()),
                KeyCode::Char('0') if app.current_page == Page::Parcels => app.filter_status(None),
                KeyCode::Char(d @ '1'..='6') if app.current_page == Page::Parcels => {
                    let index = d as usize - '1' as usize;
                    app.filter_status(ParcelStatus::ALL.get(index).copied());
                }
                KeyCode::Down | KeyCode::Char('j') => app.move_selection(1),
                KeyCode::Up | KeyCode::Char('k') => app.move_selection(-1),
                KeyCode::PageDown => app.move_selection(20),
                KeyCode::PageUp => app.move_selection(-20),
                KeyCode::Home => app.select_first(),
                KeyCode::End => app.select_last(),
                _ => {}
            }
        }
    }
}

fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Tabs
            Constraint::Min(0),
            Constraint::Length(3), // Key help
        ])
        .split(f.size());

    render_header(f, chunks[0], app);

    if app.show_detail && app.current_page == Page::Parcels {
        let content_chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
            .split(chunks[1]);

        render_parcels(f, content_chunks[0], app);
        render_detail_panel(f, content_chunks[1], app);
    } else {
        match app.current_page {
            Page::Summary => render_summary(f, chunks[1], app),
            Page::Parcels => render_parcels(f, chunks[1], app),
            Page::Priority => render_priority(f, chunks[1], app),
            Page::Deadlines => render_deadlines(f, chunks[1], app),
        }
    }

    render_status_bar(f, chunks[2], app);
}

fn status_color(status: ParcelStatus) -> Color {
    match status {
        ParcelStatus::Current => Color::Green,
        ParcelStatus::Delinquent => Color::Red,
        ParcelStatus::Disputed => Color::Magenta,
        ParcelStatus::Recon => Color::Yellow,
        ParcelStatus::Verify => Color::Cyan,
        ParcelStatus::Settled => Color::Blue,
    }
}

fn bucket_color(bucket: DeadlineBucket) -> Color {
    match bucket {
        DeadlineBucket::Overdue => Color::Red,
        DeadlineBucket::Urgent => Color::LightRed,
        DeadlineBucket::Soon => Color::Yellow,
        DeadlineBucket::Later => Color::Green,
    }
}

fn header_row(titles: &[&'static str]) -> Row<'static> {
    let cells = titles.iter().map(|h| {
        Cell::from(*h).style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
    });
    Row::new(cells).style(Style::default().bg(Color::DarkGray)).height(1)
}

fn table_block(title: &str) -> Block<'_> {
    Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::White))
        .title(title)
}

fn highlight() -> Style {
    Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD)
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let mut tab_spans = vec![];
    for (i, page) in PAGES.iter().enumerate() {
        if i > 0 {
            tab_spans.push(Span::raw(" │ "));
        }

        let style = if *page == app.current_page {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
        } else {
            Style::default().fg(Color::DarkGray)
        };

        tab_spans.push(Span::styled(page.title().to_string(), style));
    }

    tab_spans.push(Span::raw("  |  "));
    tab_spans.push(Span::styled(
        format!("As of {}", app.summary.as_of),
        Style::default().fg(Color::White),
    ));
    tab_spans.push(Span::raw("  |  "));
    tab_spans.push(Span::styled(
        format!("Arrears {}", format_money(app.summary.total_arrears)),
        Style::default().fg(Color::Red),
    ));
    tab_spans.push(Span::raw("  |  "));
    tab_spans.push(Span::styled(
        format!("Lien cutoff in {}d", app.summary.days_to_lien_cutoff),
        Style::default().fg(if app.summary.days_to_lien_cutoff <= 14 {
            Color::Red
        } else {
            Color::Green
        }),
    ));

    let header = Paragraph::new(vec![Line::from(tab_spans)])
        .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::Cyan)));

    f.render_widget(header, area);
}

fn render_summary(f: &mut Frame, area: Rect, app: &App) {
    let s = &app.summary;
    let label = |text: &str| {
        Span::styled(
            format!("  {:<26}", text),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        )
    };

    let mut content = vec![
        Line::from(""),
        Line::from(vec![Span::styled(
            "  Kirby Gate Campus",
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
        )]),
        Line::from(""),
        Line::from(vec![label("Parcels"), Span::raw(s.total_parcels.to_string())]),
        Line::from(vec![
            label("Tracked / campus SF"),
            Span::raw(format!("{} / {}", s.tracked_sqft, s.campus_sqft)),
        ]),
        Line::from(vec![label("Campus weekly rate"), Span::raw(format_money(s.campus_weekly_rate))]),
        Line::from(vec![label("Delinquent weekly"), Span::raw(format_money(s.delinquent_weekly))]),
        Line::from(""),
        Line::from(vec![
            label("Delinquent arrears"),
            Span::styled(format_money(s.delinquent_arrears), Style::default().fg(Color::Red)),
        ]),
        Line::from(vec![
            label("Disputed arrears"),
            Span::styled(format_money(s.disputed_arrears), Style::default().fg(Color::Magenta)),
        ]),
        Line::from(vec![
            label("Recon / verify arrears"),
            Span::styled(format_money(s.recon_verify_arrears), Style::default().fg(Color::Yellow)),
        ]),
        Line::from(vec![
            label("Total arrears"),
            Span::styled(
                format_money(s.total_arrears),
                Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            ),
        ]),
        Line::from(""),
        Line::from(vec![label("Days to lien cutoff"), Span::raw(s.days_to_lien_cutoff.to_string())]),
        Line::from(vec![label("Enforcement log entries"), Span::raw(s.log_entries.to_string())]),
        Line::from(""),
        Line::from(vec![Span::styled(
            "  BY STATUS",
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
        )]),
        Line::from(""),
    ];

    for (status, count) in &s.by_status {
        content.push(Line::from(vec![
            Span::raw(format!("  {} ", status.marker())),
            Span::styled(format!("{:<12}", status.as_str()), Style::default().fg(status_color(*status))),
            Span::raw(count.to_string()),
        ]));
    }

    let panel = Paragraph::new(content).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(" Dashboard "),
    );
    f.render_widget(panel, area);
}

fn render_parcels(f: &mut Frame, area: Rect, app: &mut App) {
    let header = header_row(&["ID", "Business", "Status", "SF", "Share", "Arrears", "Weekly", "Deadline"]);

    let rows = app.visible.iter().map(|p| {
        let color = status_color(p.status);
        let deadline_color = match p.deadline_status {
            DeadlineStatus::NotDue => Color::DarkGray,
            DeadlineStatus::DueSoon => Color::Yellow,
            DeadlineStatus::Overdue => Color::LightRed,
            DeadlineStatus::LienEligible => Color::Red,
        };

        Row::new(vec![
            Cell::from(p.parcel_id.to_string()),
            Cell::from(truncate(&p.business_name, 28)),
            Cell::from(p.status.as_str()).style(Style::default().fg(color)),
            Cell::from(p.sqft.to_string()),
            Cell::from(format!("{:.3}%", p.share * 100.0)),
            Cell::from(format_money(p.arrears)).style(Style::default().fg(color)),
            Cell::from(format_money(p.weekly_pro_rata)),
            Cell::from(p.deadline_status.as_str()).style(Style::default().fg(deadline_color)),
        ])
        .height(1)
    });

    let title = match app.status_filter {
        Some(status) => format!(" Parcels: {} ", status),
        None => " Parcels ".to_string(),
    };

    let table = Table::new(
        rows,
        [
            Constraint::Length(4),
            Constraint::Length(30),
            Constraint::Length(11),
            Constraint::Length(9),
            Constraint::Length(9),
            Constraint::Length(14),
            Constraint::Length(11),
            Constraint::Length(14),
        ],
    )
    .header(header)
    .block(table_block(&title))
    .highlight_style(highlight())
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.parcels_state);
}

fn render_priority(f: &mut Frame, area: Rect, app: &mut App) {
    let header = header_row(&["#", "Business", "Status", "Arrears", "SF", "Nearest deadline"]);

    let rows = app.ranking.iter().enumerate().map(|(i, r)| {
        Row::new(vec![
            Cell::from((i + 1).to_string()),
            Cell::from(truncate(r.parcel.label(), 28)),
            Cell::from(r.parcel.status.as_str()).style(Style::default().fg(status_color(r.parcel.status))),
            Cell::from(format_money(r.arrears)).style(Style::default().fg(Color::Red)),
            Cell::from(r.parcel.sqft.to_string()),
            Cell::from(r.nearest_deadline.to_string()),
        ])
        .height(1)
    });

    let table = Table::new(
        rows,
        [
            Constraint::Length(4),
            Constraint::Length(30),
            Constraint::Length(11),
            Constraint::Length(14),
            Constraint::Length(9),
            Constraint::Length(16),
        ],
    )
    .header(header)
    .block(table_block(" Enforcement Priority "))
    .highlight_style(highlight())
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.priority_state);
}

fn render_deadlines(f: &mut Frame, area: Rect, app: &mut App) {
    if app.board.is_empty() {
        let empty = Paragraph::new("\n  No packets have been marked as sent yet.")
            .block(table_block(" Deadlines "));
        f.render_widget(empty, area);
        return;
    }

    let header = header_row(&["Date", "Days", "Type", "Business", "Tracking #"]);

    let rows = app.board.iter().map(|d| {
        let color = bucket_color(d.bucket);
        Row::new(vec![
            Cell::from(d.date.to_string()).style(Style::default().fg(color)),
            Cell::from(format!("{}d", d.days_left)).style(Style::default().fg(color)),
            Cell::from(d.kind.as_str()),
            Cell::from(truncate(&d.business_name, 28)),
            Cell::from(d.tracking.clone().unwrap_or_default()),
        ])
        .height(1)
    });

    let table = Table::new(
        rows,
        [
            Constraint::Length(12),
            Constraint::Length(7),
            Constraint::Length(12),
            Constraint::Length(30),
            Constraint::Length(24),
        ],
    )
    .header(header)
    .block(table_block(" Deadlines "))
    .highlight_style(highlight())
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.deadlines_state);
}

fn render_detail_panel(f: &mut Frame, area: Rect, app: &App) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(" Parcel Details ");

    let Some(p) = app.selected_parcel() else {
        f.render_widget(Paragraph::new("No parcel selected").block(block), area);
        return;
    };

    let field = |name: &str, value: String| {
        Line::from(vec![
            Span::styled(
                format!("  {}: ", name),
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            ),
            Span::raw(value),
        ])
    };

    let billed = p
        .billed_weekly
        .map(format_money)
        .unwrap_or_else(|| "not billed".to_string());

    let content = vec![
        Line::from(""),
        field("Business", p.business_name.clone()),
        field("Address", p.address.clone()),
        Line::from(vec![
            Span::styled("  Status: ", Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
            Span::styled(p.status.as_str(), Style::default().fg(status_color(p.status))),
        ]),
        Line::from(""),
        field("Square feet", p.sqft.to_string()),
        field("Campus share", format!("{:.4}%", p.share * 100.0)),
        Line::from(""),
        Line::from("  ─────────────────────────────────────"),
        Line::from(""),
        field("Arrears", format_money(p.arrears)),
        field("Weekly pro-rata", format_money(p.weekly_pro_rata)),
        field("Monthly pro-rata", format_money(p.monthly_pro_rata)),
        field("Billed weekly", billed),
        field("Deadline status", p.deadline_status.to_string()),
        Line::from(""),
        Line::from(vec![Span::styled(
            "  Press Enter to close",
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )]),
    ];

    f.render_widget(Paragraph::new(content).block(block), area);
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &App) {
    let (selected, total) = match app.current_page {
        Page::Summary => (0, 0),
        Page::Parcels => (app.parcels_state.selected().map_or(0, |i| i + 1), app.visible.len()),
        Page::Priority => (app.priority_state.selected().map_or(0, |i| i + 1), app.ranking.len()),
        Page::Deadlines => (app.deadlines_state.selected().map_or(0, |i| i + 1), app.board.len()),
    };

    let key = |k: &'static str| Span::styled(k, Style::default().fg(Color::Yellow));

    let mut status_spans = vec![Span::styled(
        format!(" Row: {}/{} ", selected, total),
        Style::default().fg(Color::Cyan),
    )];

    if app.current_page == Page::Parcels {
        status_spans.push(Span::raw(" | "));
        status_spans.push(key("1-6"));
        status_spans.push(Span::raw(" Status "));
        status_spans.push(key("0"));
        status_spans.push(Span::raw(" All | "));
        status_spans.push(key("Enter"));
        status_spans.push(Span::raw(" Details"));
    }

    status_spans.push(Span::raw(" | "));
    status_spans.push(key("Tab"));
    status_spans.push(Span::raw(" Page | "));
    status_spans.push(key("↑/↓"));
    status_spans.push(Span::raw(" Nav | "));
    status_spans.push(Span::styled("q", Style::default().fg(Color::Red)));
    status_spans.push(Span::raw(" Quit"));

    let status_bar = Paragraph::new(vec![Line::from(status_spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );

    f.render_widget(status_bar, area);
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use covenant_enforcement::{EnforcementConfig, EnforcementEngine};
    use covenant_enforcement::seed::campus_parcels;

    fn app() -> App {
        let engine = EnforcementEngine::new(EnforcementConfig::default()).unwrap();
        let parcels = campus_parcels();
        let as_of = NaiveDate::from_ymd_opt(2026, 2, 1).unwrap();
        App::new(
            engine.summary(&parcels, &[], 0, as_of).unwrap(),
            engine.rank_delinquent(&parcels, &[], as_of).unwrap(),
            engine.all_figures(&parcels, &[], as_of).unwrap(),
            engine.machine().deadline_board(&parcels, as_of),
        )
    }

    #[test]
    fn test_pages_cycle() {
        let mut page = Page::Summary;
        for _ in 0..PAGES.len() {
            page = page.next();
        }
        assert_eq!(page, Page::Summary);
        assert_eq!(Page::Summary.previous(), Page::Deadlines);
    }

    #[test]
    fn test_status_filter() {
        let mut app = app();
        app.filter_status(Some(ParcelStatus::Delinquent));
        assert_eq!(app.visible.len(), 9);
        assert!(app.visible.iter().all(|f| f.status == ParcelStatus::Delinquent));
        assert_eq!(app.parcels_state.selected(), Some(0));

        app.filter_status(Some(ParcelStatus::Settled));
        assert!(app.visible.is_empty());
        assert_eq!(app.parcels_state.selected(), None);

        app.filter_status(None);
        assert_eq!(app.visible.len(), 21);
    }

    #[test]
    fn test_selection_wraps_and_clamps() {
        let mut app = app();
        app.current_page = Page::Parcels;

        app.move_selection(-1);
        assert_eq!(app.parcels_state.selected(), Some(20));
        app.move_selection(1);
        assert_eq!(app.parcels_state.selected(), Some(0));
        app.move_selection(20);
        app.move_selection(20);
        assert_eq!(app.parcels_state.selected(), Some(20));

        // Summary page has no table
        app.current_page = Page::Summary;
        app.move_selection(1);
        assert_eq!(app.parcels_state.selected(), Some(20));
    }
}
