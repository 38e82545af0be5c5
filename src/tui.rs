use crate::color::bucket_for;
use crate::hover::{HoverState, TOOLTIP_OFFSET_X, TOOLTIP_OFFSET_Y};
use crate::market::{weighted_change, MarketItem};
use crate::sectors::{aggregate, SectorNode};
use crossterm::{
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind,
        MouseEventKind,
    },
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, Tabs},
    Frame, Terminal,
};
use std::io;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tui_big_text::{BigText, PixelSize};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Tab {
    Heatmap,
    Movers,
}

impl Tab {
    fn title(self) -> &'static str {
        match self {
            Tab::Heatmap => "Heatmap",
            Tab::Movers => "Movers",
        }
    }

    fn all() -> &'static [Tab] {
        &[Tab::Heatmap, Tab::Movers]
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "heatmap" => Some(Tab::Heatmap),
            "movers" => Some(Tab::Movers),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NetworkStatus {
    Connected,
    Disconnected,
    Partial,
}

/// One painted heatmap tile, kept for pointer hit-testing.
#[derive(Debug, Clone, PartialEq)]
pub struct Tile {
    pub ticker: String,
    pub area: Rect,
}

pub struct App {
    pub current_tab: Tab,
    pub items: Vec<MarketItem>,
    pub tree: Vec<SectorNode>,
    pub tiles: Vec<Tile>,
    pub heatmap_area: Option<Rect>,
    pub hover: HoverState,
    pub should_quit: bool,
    pub selected_row: usize,
    pub last_update: Instant,
    pub flash_state: bool,
    pub network_status: NetworkStatus,
    pub snapshot_receiver: Option<mpsc::UnboundedReceiver<(Vec<MarketItem>, NetworkStatus)>>,
}

impl App {
    pub fn new(items: Vec<MarketItem>) -> App {
        let tree = aggregate(&items);
        App {
            current_tab: Tab::Heatmap,
            items,
            tree,
            tiles: Vec::new(),
            heatmap_area: None,
            hover: HoverState::default(),
            should_quit: false,
            selected_row: 0,
            last_update: Instant::now(),
            flash_state: false,
            network_status: NetworkStatus::Connected,
            snapshot_receiver: None,
        }
    }

    pub fn set_snapshot_receiver(
        &mut self,
        receiver: mpsc::UnboundedReceiver<(Vec<MarketItem>, NetworkStatus)>,
    ) {
        self.snapshot_receiver = Some(receiver);
    }

    /// Replace the snapshot wholesale and re-derive the tree. The previous
    /// layout is discarded; identical input lays out identically.
    pub fn set_snapshot(&mut self, items: Vec<MarketItem>) {
        self.tree = aggregate(&items);
        self.items = items;
        if self.selected_row >= self.items.len() {
            self.selected_row = self.items.len().saturating_sub(1);
        }
    }

    pub fn try_receive_snapshot_update(&mut self) -> bool {
        if let Some(receiver) = &mut self.snapshot_receiver {
            if let Ok((items, network_status)) = receiver.try_recv() {
                self.set_snapshot(items);
                self.network_status = network_status;
                self.mark_refreshed();
                return true;
            }
        }
        false
    }

    pub fn mark_refreshed(&mut self) {
        self.last_update = Instant::now();
        self.flash_state = !self.flash_state;
    }

    pub fn next_tab(&mut self) {
        let tabs = Tab::all();
        let current_index = tabs
            .iter()
            .position(|&t| t == self.current_tab)
            .unwrap_or(0);
        self.current_tab = tabs[(current_index + 1) % tabs.len()];
        self.hover.pointer_left();
    }

    pub fn previous_tab(&mut self) {
        let tabs = Tab::all();
        let current_index = tabs
            .iter()
            .position(|&t| t == self.current_tab)
            .unwrap_or(0);
        self.current_tab = tabs[(current_index + tabs.len() - 1) % tabs.len()];
        self.hover.pointer_left();
    }

    pub fn select_next(&mut self) {
        if self.selected_row < self.items.len().saturating_sub(1) {
            self.selected_row += 1;
        }
    }

    pub fn select_previous(&mut self) {
        if self.selected_row > 0 {
            self.selected_row -= 1;
        }
    }

    /// Resolve a pointer position to the ticker painted there, if any.
    pub fn hit_test(&self, x: u16, y: u16) -> Option<&str> {
        self.tiles
            .iter()
            .find(|tile| point_in_rect(x, y, tile.area))
            .map(|tile| tile.ticker.as_str())
    }

    pub fn on_mouse_moved(&mut self, x: u16, y: u16) {
        if self.current_tab != Tab::Heatmap {
            return;
        }
        match self.heatmap_area {
            Some(area) if point_in_rect(x, y, area) => {
                let hit = self.hit_test(x, y).map(str::to_string);
                self.hover.pointer_moved(hit.as_deref(), x, y);
            }
            // Outside the heatmap entirely counts as a pointer-leave.
            _ => self.hover.pointer_left(),
        }
    }

    fn find_item(&self, ticker: &str) -> Option<&MarketItem> {
        self.items.iter().find(|item| item.get_ticker() == ticker)
    }

    fn total_weight(&self) -> f64 {
        self.items.iter().map(MarketItem::get_weight).sum()
    }
}

/// Check if a point (x, y) is inside a Rect
fn point_in_rect(x: u16, y: u16, rect: Rect) -> bool {
    x >= rect.x && x < rect.x + rect.width && y >= rect.y && y < rect.y + rect.height
}

/// Scale a percent-space rect into terminal cells inside `within`.
///
/// Both edges are rounded independently so that sibling rects sharing an
/// edge in percent space share a cell boundary on screen: the tiling stays
/// gap-free and overlap-free after quantization.
pub fn project(rect: crate::layout::Rect, within: Rect) -> Rect {
    let x0 = (rect.x / 100.0 * f64::from(within.width)).round() as u16;
    let x1 = ((rect.x + rect.w) / 100.0 * f64::from(within.width)).round() as u16;
    let y0 = (rect.y / 100.0 * f64::from(within.height)).round() as u16;
    let y1 = ((rect.y + rect.h) / 100.0 * f64::from(within.height)).round() as u16;
    Rect::new(
        within.x + x0,
        within.y + y0,
        x1.saturating_sub(x0),
        y1.saturating_sub(y0),
    )
}

fn format_change(change_percent: f64) -> String {
    if change_percent.is_finite() {
        format!("{change_percent:+.2}%")
    } else {
        "-".to_string()
    }
}

pub async fn run_tui(
    items: Vec<MarketItem>,
    snapshot_str: String,
    refresh_secs: u64,
    tab: Option<Tab>,
) -> Result<(), Box<dyn std::error::Error>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(items);
    if let Some(tab) = tab {
        app.current_tab = tab;
    }

    // Create channel for background snapshot updates
    let (snapshot_sender, snapshot_receiver) = mpsc::unbounded_channel();
    app.set_snapshot_receiver(snapshot_receiver);

    // Spawn background task that re-fetches quotes on an interval
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(refresh_secs.max(5)));
        interval.tick().await; // the first tick fires immediately; skip it
        loop {
            interval.tick().await;
            let (items, network_status) =
                crate::create_live_snapshot(snapshot_str.clone()).await;
            if snapshot_sender.send((items, network_status)).is_err() {
                break; // Channel closed, exit task
            }
        }
    });

    let res = run_app(&mut terminal, &mut app).await;

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        println!("{err:?}");
    }

    Ok(())
}

async fn run_app<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> io::Result<()>
where
    std::io::Error: From<<B as Backend>::Error>,
{
    loop {
        terminal.draw(|f| ui(f, app))?;

        // Check for snapshot updates from the background task (non-blocking)
        app.try_receive_snapshot_update();

        if crossterm::event::poll(Duration::from_millis(100))? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => {
                        app.should_quit = true;
                    }
                    // Vim navigation - hjkl
                    KeyCode::Char('h') | KeyCode::Left => {
                        app.previous_tab();
                    }
                    KeyCode::Char('l') | KeyCode::Right | KeyCode::Tab => {
                        app.next_tab();
                    }
                    KeyCode::BackTab => {
                        app.previous_tab();
                    }
                    KeyCode::Char('j') | KeyCode::Down => {
                        if app.current_tab == Tab::Movers {
                            app.select_next();
                        }
                    }
                    KeyCode::Char('k') | KeyCode::Up => {
                        if app.current_tab == Tab::Movers {
                            app.select_previous();
                        }
                    }
                    KeyCode::Char('1') => app.current_tab = Tab::Heatmap,
                    KeyCode::Char('2') => app.current_tab = Tab::Movers,
                    _ => {}
                },
                Event::Mouse(mouse) => {
                    if mouse.kind == MouseEventKind::Moved {
                        app.on_mouse_moved(mouse.column, mouse.row);
                    }
                }
                _ => {}
            }
        }

        if app.should_quit {
            break;
        }
    }
    Ok(())
}

fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0)])
        .split(f.area());

    let tab_titles: Vec<Line> = Tab::all()
        .iter()
        .map(|t| {
            let style = if *t == app.current_tab {
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::White)
            };
            Line::from(Span::styled(t.title(), style))
        })
        .collect();

    let tabs = Tabs::new(tab_titles)
        .block(Block::default().borders(Borders::ALL).title("Market Map"))
        .style(Style::default().fg(Color::White))
        .highlight_style(Style::default().fg(Color::Yellow))
        .select(
            Tab::all()
                .iter()
                .position(|&t| t == app.current_tab)
                .unwrap_or(0),
        );

    f.render_widget(tabs, chunks[0]);

    match app.current_tab {
        Tab::Heatmap => render_heatmap_tab(f, chunks[1], app),
        Tab::Movers => render_movers(f, chunks[1], app),
    }

    // Tooltip goes on top of everything, after the layout is painted.
    if app.current_tab == Tab::Heatmap {
        render_tooltip(f, app);
    }
}

fn render_heatmap_tab(f: &mut Frame, area: Rect, app: &mut App) {
    if app.items.is_empty() {
        app.tiles.clear();
        app.heatmap_area = None;
        render_no_data(f, area);
        return;
    }

    let main_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(7),
            Constraint::Min(0),
            Constraint::Length(3),
        ])
        .split(area);

    render_summary(f, main_chunks[0], app);
    render_heatmap(f, main_chunks[1], app);

    let help_text =
        Paragraph::new("Navigation: h/l (tabs) | mouse (hover for details) | 1-2 (direct) | q (quit)")
            .block(Block::default().borders(Borders::ALL).title("Help"))
            .style(Style::default().fg(Color::Gray))
            .alignment(Alignment::Center);
    f.render_widget(help_text, main_chunks[2]);
}

fn render_summary(f: &mut Frame, area: Rect, app: &App) {
    let change = weighted_change(&app.items);
    let bucket = bucket_for(change);
    let big_text_value = format_change(change);

    let big_text = BigText::builder()
        .pixel_size(PixelSize::Quadrant)
        .style(
            Style::default()
                .fg(bucket.fill())
                .add_modifier(Modifier::BOLD),
        )
        .lines(vec![big_text_value.clone().into()])
        .build();

    let refresh_indicator = if app.flash_state { "🔄" } else { "📊" };
    let network_indicator = match app.network_status {
        NetworkStatus::Connected => "🟢",
        NetworkStatus::Partial => "🟡",
        NetworkStatus::Disconnected => "🔴",
    };
    let summary_block = Block::default()
        .borders(Borders::ALL)
        .title(format!(
            "Market Change ({} tickers, updated {}s ago) {} {}",
            app.items.len(),
            app.last_update.elapsed().as_secs(),
            refresh_indicator,
            network_indicator
        ))
        .title_alignment(Alignment::Center);

    f.render_widget(summary_block, area);

    // Center the big text within the widget
    let inner = area.inner(ratatui::layout::Margin {
        horizontal: 1,
        vertical: 1,
    });
    let big_text_width = big_text_value.len() as u16 * 4;
    let available_width = inner.width;

    let centered_area = if big_text_width < available_width {
        let margin = (available_width - big_text_width) / 2;
        Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Length(margin),
                Constraint::Min(0),
                Constraint::Length(margin),
            ])
            .split(inner)[1]
    } else {
        inner
    };

    f.render_widget(big_text, centered_area);
}

/// Paint the sector tree and rebuild the tile index used for hover
/// hit-testing. Item rects are sector-local percentages; nesting them into
/// the sector's cell rect composes them into absolute positions.
fn render_heatmap(f: &mut Frame, area: Rect, app: &mut App) {
    app.tiles.clear();
    app.heatmap_area = Some(area);

    let total_weight = app.total_weight();
    for sector in &app.tree {
        let sector_cells = project(sector.rect, area);
        if sector_cells.width < 3 || sector_cells.height < 3 {
            // Too small for a bordered block; skip rather than paint garbage.
            continue;
        }

        let share = if total_weight > 0.0 {
            sector.weight / total_weight * 100.0
        } else {
            0.0
        };
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray))
            .title(format!("{} {share:.1}%", sector.name));
        let inner = block.inner(sector_cells);
        f.render_widget(block, sector_cells);

        for node in &sector.items {
            let cells = project(node.rect, inner);
            if cells.width == 0 || cells.height == 0 {
                continue;
            }

            let bucket = bucket_for(node.item.get_change_percent());
            let style = Style::default().bg(bucket.fill()).fg(bucket.text());

            let ticker = node.item.get_ticker();
            let mut lines: Vec<Line> = Vec::new();
            if cells.height >= 2 && cells.width > ticker.len() as u16 {
                lines.push(Line::from(ticker.to_string()));
                lines.push(Line::from(format_change(node.item.get_change_percent())));
            } else if cells.width > ticker.len() as u16 {
                lines.push(Line::from(ticker.to_string()));
            }

            let tile = Paragraph::new(lines)
                .style(style)
                .alignment(Alignment::Center);
            f.render_widget(tile, cells);

            app.tiles.push(Tile {
                ticker: ticker.to_string(),
                area: cells,
            });
        }
    }
}

fn render_tooltip(f: &mut Frame, app: &App) {
    let (ticker, x, y) = match &app.hover {
        HoverState::Hovering { ticker, x, y } => (ticker.as_str(), *x, *y),
        HoverState::Idle => return,
    };
    let Some(item) = app.find_item(ticker) else {
        return;
    };

    let bucket = bucket_for(item.get_change_percent());
    let total_weight = app.total_weight();
    let share = if total_weight > 0.0 {
        item.get_weight() / total_weight * 100.0
    } else {
        0.0
    };

    let mut lines = vec![Line::from(Span::styled(
        item.get_ticker().to_string(),
        Style::default().add_modifier(Modifier::BOLD),
    ))];
    if item.get_name() != item.get_ticker() {
        lines.push(Line::from(item.get_name().to_string()));
    }
    lines.push(Line::from(format!("Price:  {:.2}", item.get_price())));
    lines.push(Line::from(vec![
        Span::raw("Change: "),
        Span::styled(
            format_change(item.get_change_percent()),
            Style::default().fg(bucket.fill()),
        ),
    ]));
    lines.push(Line::from(format!(
        "Sector: {}",
        item.get_sector().unwrap_or(crate::sectors::OTHERS_SECTOR)
    )));
    lines.push(Line::from(format!("Weight: {share:.1}% of map")));

    let width = (lines
        .iter()
        .map(Line::width)
        .max()
        .unwrap_or(0) as u16)
        .saturating_add(2)
        .max(18);
    let height = lines.len() as u16 + 2;

    let frame_area = f.area();
    let mut popup_x = x.saturating_add(TOOLTIP_OFFSET_X);
    let mut popup_y = y.saturating_add(TOOLTIP_OFFSET_Y);
    if popup_x + width > frame_area.width {
        popup_x = frame_area.width.saturating_sub(width);
    }
    if popup_y + height > frame_area.height {
        popup_y = frame_area.height.saturating_sub(height);
    }
    let popup_area = Rect::new(popup_x, popup_y, width, height);

    f.render_widget(Clear, popup_area);
    let tooltip = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(bucket.fill())),
    );
    f.render_widget(tooltip, popup_area);
}

fn render_movers(f: &mut Frame, area: Rect, app: &App) {
    if app.items.is_empty() {
        render_no_data(f, area);
        return;
    }

    let header_cells = ["Ticker", "Name", "Sector", "Price", "Change"].iter().map(|h| {
        Cell::from(*h).style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )
    });
    let header = Row::new(header_cells).height(1).bottom_margin(1);

    // Biggest absolute movers first
    let mut ranked: Vec<&MarketItem> = app.items.iter().collect();
    ranked.sort_by(|a, b| {
        let ka = if a.get_change_percent().is_finite() {
            a.get_change_percent().abs()
        } else {
            -1.0
        };
        let kb = if b.get_change_percent().is_finite() {
            b.get_change_percent().abs()
        } else {
            -1.0
        };
        kb.partial_cmp(&ka)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.get_ticker().cmp(b.get_ticker()))
    });

    let rows = ranked.iter().enumerate().map(|(i, item)| {
        let bucket = bucket_for(item.get_change_percent());
        let row_style = if i == app.selected_row {
            Style::default().bg(Color::DarkGray)
        } else {
            Style::default()
        };
        Row::new(vec![
            Cell::from(item.get_ticker().to_string()),
            Cell::from(item.get_name().to_string()),
            Cell::from(
                item.get_sector()
                    .unwrap_or(crate::sectors::OTHERS_SECTOR)
                    .to_string(),
            ),
            Cell::from(format!("{:.2}", item.get_price())),
            Cell::from(format_change(item.get_change_percent()))
                .style(Style::default().fg(bucket.fill())),
        ])
        .height(1)
        .style(row_style)
    });

    let constraints = [
        Constraint::Percentage(12),
        Constraint::Percentage(33),
        Constraint::Percentage(25),
        Constraint::Percentage(15),
        Constraint::Percentage(15),
    ];

    let table = Table::new(rows, constraints)
        .header(header)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Top Movers - j/k (select) | h/l (tabs) | q (quit)"),
        )
        .style(Style::default().fg(Color::White));

    f.render_widget(table, area);
}

fn render_no_data(f: &mut Frame, area: Rect) {
    let no_data = Paragraph::new("No market data - the snapshot is empty")
        .block(Block::default().borders(Borders::ALL).title("Heatmap"))
        .style(Style::default().fg(Color::Yellow))
        .alignment(Alignment::Center);

    f.render_widget(no_data, area);
}
